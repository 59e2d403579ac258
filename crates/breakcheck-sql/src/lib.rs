//! Model text analysis
//!
//! This crate handles:
//! - Rendering dbt Jinja templates to plain SQL
//! - Tokenizing SQL with the sqlparser tokenizer
//! - Extracting the top-level projection list as a [`breakcheck_core::Schema`]

pub mod extractor;
pub mod template;

pub use extractor::{normalize_type, ExtractError, SchemaExtractor};
pub use template::{strip_tags, TargetContext, TemplateContext, TemplateRenderer};

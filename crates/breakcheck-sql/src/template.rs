//! dbt Jinja rendering
//!
//! Model files are Jinja templates. Before the projection list can be
//! tokenized, `{{ ref() }}`, `{{ config() }}` and friends have to become plain
//! SQL. Templates that use macros we do not know (package macros, custom
//! materializations) fall back to having their tags stripped.

use minijinja::value::{Rest, Value};
use minijinja::Environment;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Target information exposed to templates as `target`
#[derive(Debug, Clone, Serialize)]
pub struct TargetContext {
    pub name: String,
    pub schema: String,
    #[serde(rename = "type")]
    pub target_type: String,
}

impl Default for TargetContext {
    fn default() -> Self {
        Self {
            name: "dev".to_string(),
            schema: "public".to_string(),
            target_type: "postgres".to_string(),
        }
    }
}

/// Variables visible while rendering a model
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
    pub target: TargetContext,

    /// Project variables, readable through `var()`
    #[serde(skip)]
    pub vars: BTreeMap<String, String>,
}

/// Renders dbt model templates to plain SQL
pub struct TemplateRenderer {
    env: Environment<'static>,
    context: TemplateContext,
}

impl TemplateRenderer {
    /// Create a renderer with the given context
    pub fn new(context: TemplateContext) -> Self {
        let mut env = Environment::new();

        env.add_function("ref", ref_function);
        env.add_function("source", source_function);
        env.add_function("config", config_function);
        env.add_function("is_incremental", || false);

        let vars = context.vars.clone();
        env.add_function("var", move |name: String, default: Option<Value>| -> Value {
            match vars.get(&name) {
                Some(value) => Value::from(value.clone()),
                None => default.unwrap_or_else(|| Value::from("")),
            }
        });

        env.add_function("env_var", |name: String, default: Option<String>| -> String {
            std::env::var(&name).ok().or(default).unwrap_or_default()
        });

        Self { env, context }
    }

    /// Check if text contains Jinja syntax
    pub fn has_jinja(sql: &str) -> bool {
        sql.contains("{{") || sql.contains("{%") || sql.contains("{#")
    }

    /// Render a model to SQL
    ///
    /// Never fails: a template that cannot be rendered has its tags removed
    /// instead, which keeps the surrounding SQL intact for extraction.
    pub fn render(&self, sql: &str) -> String {
        if !Self::has_jinja(sql) {
            return sql.to_string();
        }

        match self.env.render_str(sql, Value::from_serialize(&self.context)) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::debug!(error = %err, "template render failed, stripping tags");
                strip_tags(sql)
            }
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(TemplateContext::default())
    }
}

/// `ref('model')` or `ref('package', 'model')` renders as the model name
fn ref_function(model_or_package: String, model: Option<String>) -> String {
    model.unwrap_or(model_or_package)
}

/// `source('source', 'table')` renders as `source.table`
fn source_function(source_name: String, table_name: String) -> String {
    format!("{}.{}", source_name, table_name)
}

/// `config(...)` is metadata only
fn config_function(_args: Rest<Value>) -> String {
    String::new()
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\}").expect("template tag pattern is valid")
    })
}

/// Replace every Jinja tag with a single space
pub fn strip_tags(sql: &str) -> String {
    tag_pattern().replace_all(sql, " ").into_owned()
}

//! breakcheck core
//!
//! Domain model shared by every crate: schemas, breaking change records,
//! warnings, the report and the config file.
//! Never rename `change_type` strings - they are part of the report format.

pub mod change;
pub mod config;
pub mod report;
pub mod schema;
pub mod warning;

pub use change::{
    ChangeDetails, ChangeKind, ChangeRecord, ColumnRemoval, DependencyCycle, SchemaShift,
    TypeChange, TypeChanges, PROJECT_STRUCTURE,
};
pub use config::{AllowlistRules, Config, ConfigError, DialectConfig, PrConfig, CONFIG_FILE_NAME};
pub use report::{Report, ReportSummary};
pub use schema::Schema;
pub use warning::{AnalysisWarning, WarningKind};

//! Configuration schema (breakcheck.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "breakcheck.toml";

/// SQL dialect used to tokenize model files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// BigQuery SQL dialect
    BigQuery,

    /// Snowflake SQL dialect
    Snowflake,

    /// PostgreSQL SQL dialect
    Postgres,

    /// Generic ANSI SQL
    #[default]
    Ansi,
}

/// Allowlist rules for specific models or patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowlistRules {
    /// Changed files matching these patterns are not diffed
    #[serde(default)]
    pub skip_models: Vec<String>,
}

impl AllowlistRules {
    /// Check if a file path matches any pattern in the list
    fn matches_pattern(path: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, path)
            } else {
                pattern == path
            }
        })
    }

    /// Check if a changed file should be skipped
    pub fn is_model_skipped(&self, path: &str) -> bool {
        Self::matches_pattern(path, &self.skip_models)
    }
}

/// Pull request annotation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrConfig {
    /// Heading that delimits the generated section in the PR description
    #[serde(default = "default_section_title")]
    pub section_title: String,

    /// GitHub API base URL (GitHub Enterprise installs differ)
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_section_title() -> String {
    "## dbt Breaking Change Analysis".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for PrConfig {
    fn default() -> Self {
        Self {
            section_title: default_section_title(),
            api_url: default_api_url(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Git revision the head is compared against
    #[serde(default = "default_base_ref")]
    pub base_ref: String,

    /// Manifest location, relative to the project root
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// File extensions treated as model definitions
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Stop diffing files once this many seconds have passed
    #[serde(default)]
    pub time_budget_secs: Option<u64>,

    /// Allowlist rules
    #[serde(default)]
    pub allowlist: AllowlistRules,

    /// Pull request annotation
    #[serde(default)]
    pub pr: PrConfig,

    /// Project variables, readable from models through `var()`
    #[serde(default)]
    pub vars: BTreeMap<String, toml::Value>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_base_ref() -> String {
    "origin/main".to_string()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("target").join("manifest.json")
}

fn default_extensions() -> Vec<String> {
    vec!["sql".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            base_ref: default_base_ref(),
            manifest_path: default_manifest_path(),
            extensions: default_extensions(),
            allowlist: AllowlistRules::default(),
            time_budget_secs: None,
            pr: PrConfig::default(),
            vars: BTreeMap::new(),
            project_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                config.project_root = parent.to_path_buf();
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Variables as the text they render to in a model
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), text)
            })
            .collect()
    }

    /// Absolute-or-relative path to the manifest for this project
    pub fn manifest_location(&self) -> PathBuf {
        if self.manifest_path.is_absolute() {
            self.manifest_path.clone()
        } else {
            self.project_root.join(&self.manifest_path)
        }
    }
}

/// Glob matching where each `*` matches any run of characters, `/` included
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or_default();

    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let segments: Vec<&str> = segments.collect();
    let Some((last, middle)) = segments.split_last() else {
        // no `*` at all
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.dialect, DialectConfig::Ansi);
        assert_eq!(config.base_ref, "origin/main");
        assert_eq!(config.manifest_location(), Path::new(".").join("target").join("manifest.json"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            dialect = "snowflake"
            base_ref = "origin/develop"

            [allowlist]
            skip_models = ["models/staging/*"]
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, DialectConfig::Snowflake);
        assert_eq!(config.base_ref, "origin/develop");
        assert_eq!(config.extensions, vec!["sql".to_string()]);
        assert_eq!(config.pr.section_title, "## dbt Breaking Change Analysis");
        assert!(config.allowlist.is_model_skipped("models/staging/stg_users.sql"));
        assert!(!config.allowlist.is_model_skipped("models/marts/users.sql"));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let result = Config::from_toml("dialect = [");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.dialect, parsed.dialect);
        assert_eq!(config.extensions, parsed.extensions);
    }

    #[test]
    fn vars_render_as_text() {
        let config = Config::from_toml(
            r#"
            [vars]
            id_column = "account_id"
            lookback_days = 3
            "#,
        )
        .unwrap();

        let vars = config.template_vars();
        assert_eq!(vars.get("id_column").map(String::as_str), Some("account_id"));
        assert_eq!(vars.get("lookback_days").map(String::as_str), Some("3"));
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("models/staging/*", "models/staging/users.sql"));
        assert!(glob_match("*.sql", "model.sql"));
        assert!(!glob_match("staging.*", "prod.users"));
        assert!(!glob_match("ab*ba", "aba"));
    }

    #[test]
    fn glob_with_several_wildcards() {
        assert!(glob_match("models/*/legacy_*.sql", "models/staging/legacy_users.sql"));
        assert!(glob_match("models/*/legacy_*.sql", "models/a/b/legacy_.sql"));
        assert!(!glob_match("models/*/legacy_*.sql", "models/staging/users.sql"));
        assert!(!glob_match("models/*/legacy_*.sql", "seeds/x/legacy_users.sql"));
        assert!(glob_match("*stg_*", "models/staging/stg_orders.sql"));
        assert!(!glob_match("a*b*c", "acb"));
        assert!(!glob_match("*.sql*.sql", "x.sql"));
    }

    #[test]
    fn skip_rules_accept_nested_patterns() {
        let config = Config::from_toml(
            r#"
            [allowlist]
            skip_models = ["models/*/legacy_*.sql"]
            "#,
        )
        .unwrap();

        assert!(config.allowlist.is_model_skipped("models/marts/legacy_orders.sql"));
        assert!(!config.allowlist.is_model_skipped("models/marts/orders.sql"));
    }
}

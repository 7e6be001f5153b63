//! TOML configuration.
//!
//! Every section except `[db]` is optional. `load_config` reads the file,
//! applies defaults, and rejects values the engines cannot work with.
//!
//! ```toml
//! [db]
//! path = "./data/charts.sqlite"
//!
//! [classifier]
//! lookback_days = 7
//! mode = "windowed"
//!
//! [dimensions]
//! default_country = "US"
//! ```

use anyhow::{Context, Result};
use chartwatch_core::classify::{
    ClassifierPolicy, CompareMode, EntryRule, RankAveraging, ReentryScope,
};
use chartwatch_core::dimension::{DimensionKey, DimensionQuery, DimensionRules};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub dimensions: DimensionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,
    #[serde(default)]
    pub mode: CompareMode,
    #[serde(default)]
    pub averaging: RankAveraging,
    #[serde(default)]
    pub reentry_scope: ReentryScope,
    #[serde(default)]
    pub entry_rule: EntryRule,
    /// Chart analysed when a request does not name one.
    #[serde(default = "default_chart_type")]
    pub chart_type: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            mode: CompareMode::default(),
            averaging: RankAveraging::default(),
            reentry_scope: ReentryScope::default(),
            entry_rule: EntryRule::default(),
            chart_type: default_chart_type(),
        }
    }
}

fn default_lookback_days() -> usize {
    7
}
fn default_chart_type() -> String {
    "top_free".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DimensionsConfig {
    #[serde(default)]
    pub default_country: Option<String>,
    #[serde(default = "default_subcategory_parents")]
    pub subcategory_parents: Vec<String>,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            default_country: None,
            subcategory_parents: default_subcategory_parents(),
        }
    }
}

fn default_subcategory_parents() -> Vec<String> {
    vec!["Games".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_chart_type")]
    pub default_chart_type: String,
    #[serde(default = "default_category")]
    pub default_category: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_dir: None,
            include_globs: default_include_globs(),
            default_chart_type: default_chart_type(),
            default_category: default_category(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.csv".to_string()]
}
fn default_category() -> String {
    "Overall".to_string()
}

impl Config {
    pub fn classifier_policy(&self) -> ClassifierPolicy {
        ClassifierPolicy {
            lookback_days: self.classifier.lookback_days,
            mode: self.classifier.mode,
            averaging: self.classifier.averaging,
            reentry_scope: self.classifier.reentry_scope,
            entry_rule: self.classifier.entry_rule,
        }
    }

    pub fn dimension_rules(&self) -> DimensionRules {
        DimensionRules {
            default_country: self.dimensions.default_country.clone(),
            default_chart_type: self.classifier.chart_type.clone(),
            subcategory_parents: self.dimensions.subcategory_parents.clone(),
        }
    }

    /// Resolve request filters against the configured defaults.
    pub fn resolve_key(&self, query: &DimensionQuery) -> chartwatch_core::Result<DimensionKey> {
        DimensionKey::resolve(query, &self.dimension_rules())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.classifier.lookback_days == 0 {
        anyhow::bail!("classifier.lookback_days must be >= 1");
    }

    if config.classifier.chart_type.trim().is_empty() {
        anyhow::bail!("classifier.chart_type must not be empty");
    }

    if let Some(ref country) = config.dimensions.default_country {
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!(
                "dimensions.default_country must be a two-letter code, got '{}'",
                country
            );
        }
    }

    if config.ingest.include_globs.is_empty() {
        anyhow::bail!("ingest.include_globs must list at least one pattern");
    }

    config
        .server
        .bind
        .parse::<std::net::SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: '{}'", config.server.bind))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse_config("[db]\npath = \"./data/charts.sqlite\"\n").unwrap();
        assert_eq!(config.classifier.lookback_days, 7);
        assert_eq!(config.classifier.mode, CompareMode::Windowed);
        assert_eq!(config.classifier.averaging, RankAveraging::Truncate);
        assert_eq!(config.classifier.chart_type, "top_free");
        assert_eq!(config.dimensions.subcategory_parents, vec!["Games".to_string()]);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.ingest.default_category, "Overall");
    }

    #[test]
    fn test_policy_from_config() {
        let config = parse_config(
            r#"
            [db]
            path = "charts.sqlite"

            [classifier]
            lookback_days = 3
            mode = "pairwise"
            averaging = "round"
            reentry_scope = "bounded"
            entry_rule = "window"
            "#,
        )
        .unwrap();
        let policy = config.classifier_policy();
        assert_eq!(policy.lookback_days, 3);
        assert_eq!(policy.mode, CompareMode::Pairwise);
        assert_eq!(policy.averaging, RankAveraging::Round);
        assert_eq!(policy.reentry_scope, ReentryScope::Bounded);
        assert_eq!(policy.entry_rule, EntryRule::Window);
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let err = parse_config("[db]\npath = \"x.db\"\n[classifier]\nlookback_days = 0\n").unwrap_err();
        assert!(err.to_string().contains("lookback_days"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(parse_config("[db]\npath = \"x.db\"\n[classifier]\nmode = \"weekly\"\n").is_err());
    }

    #[test]
    fn test_bad_default_country_rejected() {
        let err = parse_config("[db]\npath = \"x.db\"\n[dimensions]\ndefault_country = \"USA\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("default_country"));
    }
}

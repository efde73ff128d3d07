//! Configuration schema: raw input, validation and defaults.
//!
//! `RawConfig` mirrors the loosely-typed object handed over by callers
//! (every field optional, camelCase keys). `ConduiiConfig::validate` is the
//! only way to obtain a `ConduiiConfig` and is the single source of truth
//! for defaults used by the runner and the orchestrator.
//!
//! Config files: `conduii.toml`, `conduii.json` or `.conduii.toml` in the
//! project directory.

use crate::discovery::DiscoveryOptions;
use crate::error::ConfigError;
use crate::types::{
    AdapterConfig, AdapterType, EnvironmentConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Config file names tried by `discover_file`, in priority order
pub const CONFIG_FILE_NAMES: [&str; 3] = ["conduii.toml", "conduii.json", ".conduii.toml"];

pub const DEFAULT_ENVIRONMENT: &str = "default";

// ============================================================================
// Raw Input
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub name: Option<String>,
    pub version: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub environment: Option<String>,
    pub auto_discover: Option<bool>,
    pub verbose: Option<bool>,
    #[serde(default)]
    pub environments: BTreeMap<String, RawEnvironment>,
    #[serde(default)]
    pub adapters: Vec<RawAdapter>,
    #[serde(default)]
    pub defaults: RawDefaults,
    #[serde(default)]
    pub discovery: RawDiscovery,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvironment {
    pub url: Option<String>,
    pub is_production: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAdapter {
    #[serde(rename = "type")]
    pub adapter_type: Option<String>,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDefaults {
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub parallel: Option<bool>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiscovery {
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RawConfig {
    /// Parse a TOML or JSON config file (format chosen by extension).
    ///
    /// A missing `projectDir` resolves to the file's directory; a relative
    /// one is resolved against it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut raw: RawConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            Some("json") => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        raw.project_dir = Some(match raw.project_dir.take() {
            Some(dir) if dir.is_relative() => base.join(dir),
            Some(dir) => dir,
            None => base.to_path_buf(),
        });

        Ok(raw)
    }
}

// ============================================================================
// Validated Config
// ============================================================================

/// Per-test execution defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefaults {
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub retries: u32,
    pub parallel: bool,
    pub max_concurrency: usize,
}

impl Default for TestDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            parallel: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduiiConfig {
    pub name: String,
    pub version: String,
    pub project_dir: PathBuf,
    /// Selected environment name
    pub environment: String,
    pub auto_discover: bool,
    pub verbose: bool,
    pub environments: BTreeMap<String, EnvironmentConfig>,
    pub adapters: Vec<AdapterConfig>,
    pub defaults: TestDefaults,
    pub discovery: DiscoveryOptions,
}

impl Default for ConduiiConfig {
    fn default() -> Self {
        Self {
            name: "project".to_string(),
            version: "0.0.0".to_string(),
            project_dir: PathBuf::from("."),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            auto_discover: true,
            verbose: false,
            environments: BTreeMap::new(),
            adapters: Vec::new(),
            defaults: TestDefaults::default(),
            discovery: DiscoveryOptions::default(),
        }
    }
}

impl ConduiiConfig {
    /// Validate raw input and fill defaults.
    ///
    /// Returns the first violation found, naming the offending field.
    pub fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let base = ConduiiConfig::default();

        let project_dir = raw.project_dir.unwrap_or(base.project_dir);
        let name = match raw.name {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::invalid("name", "must not be empty"));
            }
            Some(name) => name,
            None => project_dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or(base.name),
        };

        let mut environments = BTreeMap::new();
        for (env_name, env) in raw.environments {
            let url = match env.url {
                Some(url) => Some(parse_environment_url(&env_name, &url)?),
                None => None,
            };
            environments.insert(
                env_name.clone(),
                EnvironmentConfig {
                    name: env_name,
                    url,
                    is_production: env.is_production.unwrap_or(false),
                },
            );
        }

        let environment = raw.environment.unwrap_or(base.environment);
        if !environments.is_empty() && !environments.contains_key(&environment) {
            return Err(ConfigError::invalid(
                "environment",
                format!(
                    "'{}' is not defined in environments (available: {})",
                    environment,
                    environments.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        }

        let mut adapters = Vec::with_capacity(raw.adapters.len());
        let mut seen = HashSet::new();
        for (index, adapter) in raw.adapters.into_iter().enumerate() {
            let adapter = validate_adapter(index, adapter)?;
            if !seen.insert(adapter.name.clone()) {
                return Err(ConfigError::invalid(
                    format!("adapters[{}].name", index),
                    format!("duplicate adapter name '{}'", adapter.name),
                ));
            }
            adapters.push(adapter);
        }

        let defaults = validate_defaults(raw.defaults)?;

        let mut discovery = base.discovery;
        if let Some(depth) = raw.discovery.max_depth {
            if depth == 0 {
                return Err(ConfigError::invalid("discovery.maxDepth", "must be at least 1"));
            }
            discovery.max_depth = depth;
        }
        discovery.exclude.extend(raw.discovery.exclude);

        Ok(Self {
            name,
            version: raw.version.unwrap_or(base.version),
            project_dir,
            environment,
            auto_discover: raw.auto_discover.unwrap_or(base.auto_discover),
            verbose: raw.verbose.unwrap_or(base.verbose),
            environments,
            adapters,
            defaults,
            discovery,
        })
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::validate(RawConfig::from_file(path)?)
    }

    /// First known config file present in `dir`
    pub fn discover_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// The selected environment; a URL-less `default` when none are declared
    pub fn active_environment(&self) -> EnvironmentConfig {
        self.environments
            .get(&self.environment)
            .cloned()
            .unwrap_or_else(|| EnvironmentConfig::new(self.environment.clone()))
    }
}

fn parse_environment_url(env_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let field = format!("environments.{}.url", env_name);
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(&field, format!("'{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{}' (expected http or https)", other),
        )),
    }
}

fn validate_adapter(index: usize, raw: RawAdapter) -> Result<AdapterConfig, ConfigError> {
    let type_field = format!("adapters[{}].type", index);
    let adapter_type: AdapterType = raw
        .adapter_type
        .ok_or_else(|| ConfigError::invalid(&type_field, "is required"))?
        .parse()
        .map_err(|reason: String| ConfigError::invalid(&type_field, reason))?;

    let name = raw.name.unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ConfigError::invalid(
            format!("adapters[{}].name", index),
            "is required",
        ));
    }

    Ok(AdapterConfig {
        adapter_type,
        name,
        enabled: raw.enabled.unwrap_or(true),
        credentials: raw.credentials,
        options: raw.options,
    })
}

fn validate_defaults(raw: RawDefaults) -> Result<TestDefaults, ConfigError> {
    let mut defaults = TestDefaults::default();
    if let Some(timeout) = raw.timeout {
        if timeout == 0 {
            return Err(ConfigError::invalid("defaults.timeout", "must be greater than 0"));
        }
        defaults.timeout_ms = timeout;
    }
    if let Some(retries) = raw.retries {
        defaults.retries = retries;
    }
    if let Some(parallel) = raw.parallel {
        defaults.parallel = parallel;
    }
    if let Some(max) = raw.max_concurrency {
        if max == 0 {
            return Err(ConfigError::invalid(
                "defaults.maxConcurrency",
                "must be at least 1",
            ));
        }
        defaults.max_concurrency = max;
    }
    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw_json(json: &str) -> RawConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_filled() {
        let config = ConduiiConfig::validate(RawConfig::default()).unwrap();
        assert_eq!(config.environment, "default");
        assert!(config.auto_discover);
        assert!(!config.verbose);
        assert_eq!(config.defaults.timeout_ms, 30_000);
        assert_eq!(config.defaults.retries, 2);
        assert!(config.defaults.parallel);
        assert_eq!(config.defaults.max_concurrency, 5);
        assert_eq!(config.name, "project");
    }

    #[test]
    fn test_name_defaults_to_project_dir() {
        let config = ConduiiConfig::validate(raw_json(r#"{"projectDir": "/srv/shop-web"}"#)).unwrap();
        assert_eq!(config.name, "shop-web");
    }

    #[test]
    fn test_rejects_non_url_environment() {
        let err = ConduiiConfig::validate(raw_json(
            r#"{"environment": "staging", "environments": {"staging": {"url": "not a url"}}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.field(), Some("environments.staging.url"));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = ConduiiConfig::validate(raw_json(
            r#"{"environments": {"default": {"url": "ftp://example.com"}}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.field(), Some("environments.default.url"));
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_rejects_unknown_adapter_type() {
        let err = ConduiiConfig::validate(raw_json(
            r#"{"adapters": [{"type": "database", "name": "db"}, {"type": "blockchain", "name": "chain"}]}"#,
        ))
        .unwrap_err();
        assert_eq!(err.field(), Some("adapters[1].type"));
    }

    #[test]
    fn test_rejects_duplicate_adapter_names() {
        let err = ConduiiConfig::validate(raw_json(
            r#"{"adapters": [{"type": "database", "name": "db"}, {"type": "auth", "name": "db"}]}"#,
        ))
        .unwrap_err();
        assert_eq!(err.field(), Some("adapters[1].name"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = ConduiiConfig::validate(raw_json(r#"{"defaults": {"maxConcurrency": 0}}"#))
            .unwrap_err();
        assert_eq!(err.field(), Some("defaults.maxConcurrency"));
    }

    #[test]
    fn test_rejects_undeclared_environment() {
        let err = ConduiiConfig::validate(raw_json(
            r#"{"environment": "prod", "environments": {"staging": {"url": "https://staging.example.com"}}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.field(), Some("environment"));
    }

    #[test]
    fn test_active_environment() {
        let config = ConduiiConfig::validate(raw_json(
            r#"{"environment": "staging", "environments": {"staging": {"url": "https://staging.example.com", "isProduction": false}}}"#,
        ))
        .unwrap();
        let env = config.active_environment();
        assert_eq!(env.name, "staging");
        assert_eq!(env.url.unwrap().host_str(), Some("staging.example.com"));

        let bare = ConduiiConfig::validate(RawConfig::default()).unwrap();
        assert_eq!(bare.active_environment().name, "default");
        assert!(bare.active_environment().url.is_none());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conduii.toml");
        fs::write(
            &path,
            r#"
name = "shop"
autoDiscover = false

[defaults]
timeout = 5000
maxConcurrency = 2

[environments.production]
url = "https://shop.example.com"
isProduction = true

[[adapters]]
type = "payment"
name = "stripe"

[adapters.credentials]
STRIPE_SECRET_KEY = "sk_test_123"
"#,
        )
        .unwrap();

        assert_eq!(ConduiiConfig::discover_file(dir.path()), Some(path.clone()));

        let raw = RawConfig::from_file(&path).unwrap();
        assert_eq!(raw.project_dir.as_deref(), Some(dir.path()));

        let mut raw = raw;
        raw.environment = Some("production".to_string());
        let config = ConduiiConfig::validate(raw).unwrap();
        assert_eq!(config.name, "shop");
        assert!(!config.auto_discover);
        assert_eq!(config.defaults.timeout_ms, 5000);
        assert_eq!(config.defaults.max_concurrency, 2);
        assert_eq!(config.defaults.retries, 2);
        assert_eq!(config.adapters[0].adapter_type, AdapterType::Payment);
        assert_eq!(
            config.adapters[0].credentials.get("STRIPE_SECRET_KEY").map(String::as_str),
            Some("sk_test_123")
        );
        assert!(config.active_environment().is_production);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conduii.yaml");
        fs::write(&path, "name: x").unwrap();
        assert!(matches!(
            RawConfig::from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}

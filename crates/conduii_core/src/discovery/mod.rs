//! Discovery Engine
//!
//! Walks a project directory, collects service signals from environment
//! files and dependency manifests, infers HTTP endpoints from routing
//! conventions, and turns the findings into suggested tests.
//!
//! The walk never follows symlinks and visits entries in file-name order,
//! so an unchanged tree always yields the same result.

mod routes;
mod signals;

pub use routes::{
    classify_route_file, infer_methods, DiscoveredEndpoint, HttpMethod, RouteFile, RouterKind,
};
pub use signals::{
    classify_env_var, classify_package, ManifestKind, Signal, DEPENDENCY_CONFIDENCE,
    ENV_VAR_CONFIDENCE,
};

use crate::config::TestDefaults;
use crate::error::DiscoveryError;
use crate::types::{AdapterType, TestConfig, TestType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory names never descended into
pub const DEFAULT_EXCLUDES: [&str; 14] = [
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    "out",
    "target",
    "coverage",
    ".turbo",
    ".vercel",
    ".svelte-kit",
    "__pycache__",
    ".venv",
    "vendor",
];

/// Upper bound for a merged confidence score
const MAX_CONFIDENCE: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOptions {
    pub max_depth: usize,
    /// Extra directory names, on top of `DEFAULT_EXCLUDES`
    pub exclude: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            exclude: Vec::new(),
        }
    }
}

impl DiscoveryOptions {
    pub fn is_excluded(&self, dir_name: &str) -> bool {
        DEFAULT_EXCLUDES.contains(&dir_name) || self.exclude.iter().any(|e| e == dir_name)
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvidenceSource {
    EnvVar,
    Dependency,
}

/// Where a signal was observed. Ordered by source, then file, then key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    /// Project-relative path
    pub file: PathBuf,
    /// Variable name or package name
    pub key: String,
}

/// A service the project appears to depend on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredService {
    #[serde(rename = "type")]
    pub service_type: AdapterType,
    pub name: String,
    /// In `[0, 1)`; grows with every independent piece of evidence
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub project_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Sorted by name, then type; one entry per `(name, type)`
    pub services: Vec<DiscoveredService>,
    pub endpoints: Vec<DiscoveredEndpoint>,
    pub suggested_tests: Vec<TestConfig>,
    pub files_scanned: usize,
    /// Unreadable entries and unparsable manifests
    pub skipped_paths: usize,
}

impl DiscoveryResult {
    pub fn service(&self, name: &str) -> Option<&DiscoveredService> {
        self.services.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DiscoveryEngine {
    options: DiscoveryOptions,
    defaults: TestDefaults,
}

#[derive(Default)]
struct ScanState {
    signals: Vec<Signal>,
    endpoints: Vec<DiscoveredEndpoint>,
    framework: Option<(usize, &'static str)>,
    files_scanned: usize,
    skipped_paths: usize,
}

impl DiscoveryEngine {
    pub fn new(options: DiscoveryOptions, defaults: TestDefaults) -> Self {
        Self { options, defaults }
    }

    /// Run `scan` on the blocking thread pool
    pub async fn discover(&self, root: &Path) -> Result<DiscoveryResult, DiscoveryError> {
        let engine = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || engine.scan(&root))
            .await
            .map_err(|e| DiscoveryError::Task(e.to_string()))?
    }

    /// Walk `root` synchronously and build the discovery result
    pub fn scan(&self, root: &Path) -> Result<DiscoveryResult, DiscoveryError> {
        if !root.is_dir() {
            return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
        }

        info!("Scanning {} for services", root.display());
        let mut state = ScanState::default();

        let walker = WalkDir::new(root)
            .max_depth(self.options.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && self.options.is_excluded(&e.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    state.skipped_paths += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            state.files_scanned += 1;

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            self.inspect_file(path, relative, &mut state);
        }

        let services = merge_signals(state.signals);
        let endpoints = dedupe_endpoints(state.endpoints);
        let suggested_tests = self.suggest_tests(&services, &endpoints);

        info!(
            "Discovery of {} complete: {} files, {} services, {} endpoints",
            root.display(),
            state.files_scanned,
            services.len(),
            endpoints.len()
        );

        Ok(DiscoveryResult {
            project_dir: root.to_path_buf(),
            framework: state.framework.map(|(_, name)| name.to_string()),
            services,
            endpoints,
            suggested_tests,
            files_scanned: state.files_scanned,
            skipped_paths: state.skipped_paths,
        })
    }

    fn inspect_file(&self, path: &Path, relative: &Path, state: &mut ScanState) {
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return,
        };

        if signals::is_env_file(file_name) {
            if let Some(contents) = read_file(path, state) {
                state.signals.extend(signals::env_signals(&contents, relative));
            }
        } else if let Some(kind) = ManifestKind::from_file_name(file_name) {
            let Some(contents) = read_file(path, state) else {
                return;
            };
            match signals::manifest_packages(kind, &contents) {
                Ok(packages) => {
                    state
                        .signals
                        .extend(signals::dependency_signals(&packages, relative));
                    if let Some(found) = signals::detect_framework(&packages) {
                        if state.framework.map_or(true, |current| found.0 < current.0) {
                            state.framework = Some(found);
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping unparsable manifest {}: {}", path.display(), e);
                    state.skipped_paths += 1;
                }
            }
        } else if let Some(route) = classify_route_file(relative) {
            if let Some(contents) = read_file(path, state) {
                debug!("Route {} -> {}", relative.display(), route.path);
                state
                    .endpoints
                    .extend(routes::endpoints_for(&route, &contents, relative));
            }
        }
    }

    fn suggest_tests(
        &self,
        services: &[DiscoveredService],
        endpoints: &[DiscoveredEndpoint],
    ) -> Vec<TestConfig> {
        let mut ids = HashSet::new();
        let mut tests = Vec::with_capacity(services.len() + endpoints.len());

        for service in services {
            let id = unique_id(
                &mut ids,
                format!("health-{}-{}", service.service_type, slugify(&service.name)),
            );
            tests.push(
                TestConfig::new(id, format!("{} health", service.name), TestType::Health)
                    .with_timeout(self.defaults.timeout_ms)
                    .with_retries(self.defaults.retries)
                    .with_adapter(service.name.clone())
                    .with_tag("discovered")
                    .with_tag("health")
                    .with_tag(service.service_type.as_str()),
            );
        }

        for endpoint in endpoints {
            let id = unique_id(
                &mut ids,
                format!(
                    "api-{}-{}",
                    endpoint.method.as_str().to_ascii_lowercase(),
                    slugify(&endpoint.path)
                ),
            );
            tests.push(
                TestConfig::new(
                    id,
                    format!("{} {}", endpoint.method, endpoint.path),
                    TestType::Api,
                )
                .with_timeout(self.defaults.timeout_ms)
                .with_retries(self.defaults.retries)
                .with_config("method", Value::String(endpoint.method.to_string()))
                .with_config("path", Value::String(endpoint.path.clone()))
                .with_config("expectedStatus", Value::from(200))
                .with_tag("discovered")
                .with_tag("api"),
            );
        }

        tests
    }
}

fn read_file(path: &Path, state: &mut ScanState) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            warn!("Skipping unreadable file {}: {}", path.display(), e);
            state.skipped_paths += 1;
            None
        }
    }
}

/// Merge signals by `(name, type)`.
///
/// Identical evidence counts once; confidence combines as `1 - Π(1 - c)`.
pub fn merge_signals(signals: Vec<Signal>) -> Vec<DiscoveredService> {
    let mut merged: BTreeMap<(String, AdapterType), BTreeMap<Evidence, f64>> = BTreeMap::new();
    for signal in signals {
        merged
            .entry((signal.name, signal.service_type))
            .or_default()
            .entry(signal.evidence)
            .or_insert(signal.confidence);
    }

    merged
        .into_iter()
        .map(|((name, service_type), evidence)| {
            let miss: f64 = evidence.values().map(|c| 1.0 - c).product();
            DiscoveredService {
                service_type,
                name,
                confidence: (1.0 - miss).min(MAX_CONFIDENCE),
                evidence: evidence.into_keys().collect(),
            }
        })
        .collect()
}

fn dedupe_endpoints(endpoints: Vec<DiscoveredEndpoint>) -> Vec<DiscoveredEndpoint> {
    let mut unique: BTreeMap<(String, HttpMethod), PathBuf> = BTreeMap::new();
    for endpoint in endpoints {
        unique
            .entry((endpoint.path, endpoint.method))
            .or_insert(endpoint.file);
    }
    unique
        .into_iter()
        .map(|((path, method), file)| DiscoveredEndpoint { method, path, file })
        .collect()
}

/// Lowercase, `-`-separated identifier fragment; `root` for an empty input
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "root".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_id(taken: &mut HashSet<String>, base: String) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

//! Service signals: curated tables for environment variables and packages.
//!
//! A signal is one piece of evidence that the project talks to a service.
//! Signals are merged into `DiscoveredService` records by the engine.

use super::{Evidence, EvidenceSource};
use crate::types::AdapterType;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

/// Confidence contributed by a single environment variable
pub const ENV_VAR_CONFIDENCE: f64 = 0.4;

/// Confidence contributed by a single declared dependency
pub const DEPENDENCY_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub service_type: AdapterType,
    pub name: String,
    pub confidence: f64,
    pub evidence: Evidence,
}

/// Dependency manifest formats understood by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// package.json
    Npm,
    /// Cargo.toml
    Cargo,
    /// requirements.txt
    Pip,
}

impl ManifestKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "package.json" => Some(ManifestKind::Npm),
            "Cargo.toml" => Some(ManifestKind::Cargo),
            "requirements.txt" => Some(ManifestKind::Pip),
            _ => None,
        }
    }
}

// ============================================================================
// Environment Variable Table
// ============================================================================

/// `(pattern, type, service)`; first match wins
static ENV_RULES: LazyLock<Vec<(Regex, AdapterType, &'static str)>> = LazyLock::new(|| {
    [
        (r"^(NEXT_PUBLIC_)?STRIPE_", AdapterType::Payment, "stripe"),
        (r"^(NEXT_PUBLIC_)?PADDLE_", AdapterType::Payment, "paddle"),
        (r"^LEMONSQUEEZY_", AdapterType::Payment, "lemonsqueezy"),
        (r"^(NEXT_PUBLIC_)?CLERK_", AdapterType::Auth, "clerk"),
        (r"^(NEXTAUTH_|AUTH_SECRET$)", AdapterType::Auth, "nextauth"),
        (r"^(NEXT_PUBLIC_)?AUTH0_", AdapterType::Auth, "auth0"),
        (r"^(NEXT_PUBLIC_)?FIREBASE_", AdapterType::Auth, "firebase"),
        (r"^(NEXT_PUBLIC_)?SUPABASE_", AdapterType::Database, "supabase"),
        (r"^(POSTGRES_|PG(HOST|USER|PASSWORD|DATABASE|PORT)$)", AdapterType::Database, "postgres"),
        (r"^(MYSQL_|PLANETSCALE_)", AdapterType::Database, "mysql"),
        (r"^(MONGODB_|MONGO_URL$|MONGO_URI$)", AdapterType::Database, "mongodb"),
        (r"^(REDIS_URL$|UPSTASH_REDIS_|KV_)", AdapterType::Database, "redis"),
        (r"^RESEND_", AdapterType::Email, "resend"),
        (r"^SENDGRID_", AdapterType::Email, "sendgrid"),
        (r"^POSTMARK_", AdapterType::Email, "postmark"),
        (r"^MAILGUN_", AdapterType::Email, "mailgun"),
        (r"^(AWS_ACCESS_KEY_ID$|AWS_SECRET_ACCESS_KEY$|AWS_S3_|S3_BUCKET)", AdapterType::Storage, "s3"),
        (r"^BLOB_READ_WRITE_TOKEN$", AdapterType::Storage, "vercel-blob"),
        (r"^(NEXT_PUBLIC_)?CLOUDINARY_", AdapterType::Storage, "cloudinary"),
        (r"^UPLOADTHING_", AdapterType::Storage, "uploadthing"),
        (r"^(NEXT_PUBLIC_)?SENTRY_", AdapterType::Monitoring, "sentry"),
        (r"^(DD_API_KEY$|DATADOG_)", AdapterType::Monitoring, "datadog"),
        (r"^(NEXT_PUBLIC_)?POSTHOG_", AdapterType::Analytics, "posthog"),
        (r"^(NEXT_PUBLIC_)?MIXPANEL_", AdapterType::Analytics, "mixpanel"),
        (r"^(NEXT_PUBLIC_)?SEGMENT_", AdapterType::Analytics, "segment"),
        (r"^GITHUB_(TOKEN|APP_ID|APP_PRIVATE_KEY|CLIENT_ID|CLIENT_SECRET|WEBHOOK_SECRET)$", AdapterType::Repository, "github"),
        (r"^GITLAB_", AdapterType::Repository, "gitlab"),
        (r"^OPENAI_API_KEY$", AdapterType::Custom, "openai"),
        (r"^ANTHROPIC_API_KEY$", AdapterType::Custom, "anthropic"),
    ]
    .into_iter()
    .map(|(pattern, adapter_type, name)| {
        (Regex::new(pattern).unwrap(), adapter_type, name)
    })
    .collect()
});

static ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// `(package, type, service)`
const PACKAGE_RULES: &[(&str, AdapterType, &str)] = &[
    // Payment
    ("stripe", AdapterType::Payment, "stripe"),
    ("@stripe/stripe-js", AdapterType::Payment, "stripe"),
    ("@stripe/react-stripe-js", AdapterType::Payment, "stripe"),
    ("async-stripe", AdapterType::Payment, "stripe"),
    ("@paddle/paddle-node-sdk", AdapterType::Payment, "paddle"),
    ("@lemonsqueezy/lemonsqueezy.js", AdapterType::Payment, "lemonsqueezy"),
    // Auth
    ("@clerk/nextjs", AdapterType::Auth, "clerk"),
    ("@clerk/clerk-sdk-node", AdapterType::Auth, "clerk"),
    ("@clerk/backend", AdapterType::Auth, "clerk"),
    ("next-auth", AdapterType::Auth, "nextauth"),
    ("@auth/core", AdapterType::Auth, "nextauth"),
    ("@auth0/nextjs-auth0", AdapterType::Auth, "auth0"),
    ("auth0", AdapterType::Auth, "auth0"),
    ("firebase", AdapterType::Auth, "firebase"),
    ("firebase-admin", AdapterType::Auth, "firebase"),
    // Database
    ("@supabase/supabase-js", AdapterType::Database, "supabase"),
    ("@supabase/ssr", AdapterType::Database, "supabase"),
    ("pg", AdapterType::Database, "postgres"),
    ("postgres", AdapterType::Database, "postgres"),
    ("@neondatabase/serverless", AdapterType::Database, "postgres"),
    ("@vercel/postgres", AdapterType::Database, "postgres"),
    ("tokio-postgres", AdapterType::Database, "postgres"),
    ("psycopg2", AdapterType::Database, "postgres"),
    ("psycopg2-binary", AdapterType::Database, "postgres"),
    ("mysql2", AdapterType::Database, "mysql"),
    ("@planetscale/database", AdapterType::Database, "mysql"),
    ("mongodb", AdapterType::Database, "mongodb"),
    ("mongoose", AdapterType::Database, "mongodb"),
    ("pymongo", AdapterType::Database, "mongodb"),
    ("redis", AdapterType::Database, "redis"),
    ("ioredis", AdapterType::Database, "redis"),
    ("@upstash/redis", AdapterType::Database, "redis"),
    ("@vercel/kv", AdapterType::Database, "redis"),
    ("@prisma/client", AdapterType::Database, "prisma"),
    ("drizzle-orm", AdapterType::Database, "drizzle"),
    // Email
    ("resend", AdapterType::Email, "resend"),
    ("@sendgrid/mail", AdapterType::Email, "sendgrid"),
    ("sendgrid", AdapterType::Email, "sendgrid"),
    ("postmark", AdapterType::Email, "postmark"),
    ("mailgun.js", AdapterType::Email, "mailgun"),
    // Storage
    ("@aws-sdk/client-s3", AdapterType::Storage, "s3"),
    ("aws-sdk-s3", AdapterType::Storage, "s3"),
    ("boto3", AdapterType::Storage, "s3"),
    ("@vercel/blob", AdapterType::Storage, "vercel-blob"),
    ("cloudinary", AdapterType::Storage, "cloudinary"),
    ("uploadthing", AdapterType::Storage, "uploadthing"),
    // Monitoring
    ("@sentry/nextjs", AdapterType::Monitoring, "sentry"),
    ("@sentry/node", AdapterType::Monitoring, "sentry"),
    ("@sentry/react", AdapterType::Monitoring, "sentry"),
    ("sentry", AdapterType::Monitoring, "sentry"),
    ("sentry-sdk", AdapterType::Monitoring, "sentry"),
    ("dd-trace", AdapterType::Monitoring, "datadog"),
    // Analytics
    ("posthog-js", AdapterType::Analytics, "posthog"),
    ("posthog-node", AdapterType::Analytics, "posthog"),
    ("mixpanel", AdapterType::Analytics, "mixpanel"),
    ("mixpanel-browser", AdapterType::Analytics, "mixpanel"),
    ("@segment/analytics-node", AdapterType::Analytics, "segment"),
    // Repository
    ("@octokit/rest", AdapterType::Repository, "github"),
    ("octokit", AdapterType::Repository, "github"),
    ("@gitbeaker/rest", AdapterType::Repository, "gitlab"),
    // Custom
    ("openai", AdapterType::Custom, "openai"),
    ("@anthropic-ai/sdk", AdapterType::Custom, "anthropic"),
];

/// `(package, framework)` in priority order
const FRAMEWORK_RULES: &[(&str, &str)] = &[
    ("next", "nextjs"),
    ("@remix-run/node", "remix"),
    ("@remix-run/react", "remix"),
    ("nuxt", "nuxt"),
    ("@sveltejs/kit", "sveltekit"),
    ("astro", "astro"),
    ("express", "express"),
    ("fastify", "fastify"),
    ("hono", "hono"),
    ("axum", "axum"),
    ("actix-web", "actix-web"),
    ("django", "django"),
    ("fastapi", "fastapi"),
    ("flask", "flask"),
];

// ============================================================================
// Environment Files
// ============================================================================

/// True for `.env` and `.env.*` files
pub fn is_env_file(file_name: &str) -> bool {
    file_name == ".env" || file_name.starts_with(".env.")
}

/// Parse `KEY=value` lines, ignoring comments and blank lines.
/// Accepts an optional `export ` prefix and quoted values.
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if !ENV_KEY.is_match(key) {
                return None;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Match one variable against the table.
///
/// `DATABASE_URL` is resolved by URL scheme, defaulting to postgres.
pub fn classify_env_var(key: &str, value: &str) -> Option<(AdapterType, String)> {
    if key == "DATABASE_URL" {
        return Some((AdapterType::Database, database_from_url(value).to_string()));
    }
    ENV_RULES
        .iter()
        .find(|(pattern, _, _)| pattern.is_match(key))
        .map(|(_, adapter_type, name)| (*adapter_type, name.to_string()))
}

fn database_from_url(value: &str) -> &'static str {
    let scheme = value
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .or_else(|| value.split_once(':').map(|(scheme, _)| scheme))
        .unwrap_or("")
        .to_ascii_lowercase();
    match scheme.as_str() {
        "mysql" => "mysql",
        "mongodb" | "mongodb+srv" => "mongodb",
        "file" | "sqlite" => "sqlite",
        "redis" | "rediss" => "redis",
        _ => "postgres",
    }
}

pub fn env_signals(contents: &str, file: &Path) -> Vec<Signal> {
    parse_env_file(contents)
        .into_iter()
        .filter_map(|(key, value)| {
            let (service_type, name) = classify_env_var(&key, &value)?;
            Some(Signal {
                service_type,
                name,
                confidence: ENV_VAR_CONFIDENCE,
                evidence: Evidence {
                    source: EvidenceSource::EnvVar,
                    key,
                    file: file.to_path_buf(),
                },
            })
        })
        .collect()
}

// ============================================================================
// Dependency Manifests
// ============================================================================

/// Declared package names from a manifest
pub fn manifest_packages(kind: ManifestKind, contents: &str) -> Result<BTreeSet<String>, String> {
    match kind {
        ManifestKind::Npm => npm_packages(contents),
        ManifestKind::Cargo => cargo_packages(contents),
        ManifestKind::Pip => Ok(pip_packages(contents)),
    }
}

fn npm_packages(contents: &str) -> Result<BTreeSet<String>, String> {
    let json: serde_json::Value = serde_json::from_str(contents).map_err(|e| e.to_string())?;
    let mut packages = BTreeSet::new();
    for section in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(deps) = json.get(section).and_then(|d| d.as_object()) {
            packages.extend(deps.keys().cloned());
        }
    }
    Ok(packages)
}

fn cargo_packages(contents: &str) -> Result<BTreeSet<String>, String> {
    let manifest: toml::Table = toml::from_str(contents).map_err(|e| e.to_string())?;
    let mut packages = BTreeSet::new();
    for section in ["dependencies", "dev-dependencies"] {
        if let Some(deps) = manifest.get(section).and_then(|d| d.as_table()) {
            packages.extend(deps.keys().cloned());
        }
    }
    Ok(packages)
}

fn pip_packages(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(|line| {
            let end = line
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
                .unwrap_or(line.len());
            let name = &line[..end];
            (!name.is_empty()).then(|| name.to_ascii_lowercase())
        })
        .collect()
}

pub fn classify_package(package: &str) -> Option<(AdapterType, &'static str)> {
    PACKAGE_RULES
        .iter()
        .find(|(name, _, _)| *name == package)
        .map(|(_, adapter_type, service)| (*adapter_type, *service))
}

pub fn dependency_signals(packages: &BTreeSet<String>, file: &Path) -> Vec<Signal> {
    packages
        .iter()
        .filter_map(|package| {
            let (service_type, name) = classify_package(package)?;
            Some(Signal {
                service_type,
                name: name.to_string(),
                confidence: DEPENDENCY_CONFIDENCE,
                evidence: Evidence {
                    source: EvidenceSource::Dependency,
                    key: package.clone(),
                    file: file.to_path_buf(),
                },
            })
        })
        .collect()
}

/// Framework rank (lower is preferred) and name, if any package matches
pub fn detect_framework(packages: &BTreeSet<String>) -> Option<(usize, &'static str)> {
    FRAMEWORK_RULES
        .iter()
        .enumerate()
        .find(|(_, (package, _))| packages.contains(*package))
        .map(|(rank, (_, framework))| (rank, *framework))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_file() {
        let vars = parse_env_file(
            "# comment\n\nSTRIPE_SECRET_KEY=sk_test_1\nexport CLERK_SECRET_KEY=\"sk_clerk\"\nnot a var\n1BAD=x\n",
        );
        assert_eq!(
            vars,
            vec![
                ("STRIPE_SECRET_KEY".to_string(), "sk_test_1".to_string()),
                ("CLERK_SECRET_KEY".to_string(), "sk_clerk".to_string()),
            ]
        );
    }

    #[test]
    fn test_classify_secret_keys_by_provider_prefix() {
        assert_eq!(
            classify_env_var("STRIPE_SECRET_KEY", ""),
            Some((AdapterType::Payment, "stripe".to_string()))
        );
        assert_eq!(
            classify_env_var("CLERK_SECRET_KEY", ""),
            Some((AdapterType::Auth, "clerk".to_string()))
        );
        assert_eq!(
            classify_env_var("NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY", ""),
            Some((AdapterType::Payment, "stripe".to_string()))
        );
        assert_eq!(classify_env_var("SOME_SECRET_KEY", ""), None);
        assert_eq!(classify_env_var("NODE_ENV", "production"), None);
    }

    #[test]
    fn test_database_url_scheme() {
        assert_eq!(
            classify_env_var("DATABASE_URL", "postgresql://u:p@localhost:5432/db"),
            Some((AdapterType::Database, "postgres".to_string()))
        );
        assert_eq!(
            classify_env_var("DATABASE_URL", "mysql://localhost/db"),
            Some((AdapterType::Database, "mysql".to_string()))
        );
        assert_eq!(
            classify_env_var("DATABASE_URL", "mongodb+srv://cluster0.example.net/db"),
            Some((AdapterType::Database, "mongodb".to_string()))
        );
        assert_eq!(
            classify_env_var("DATABASE_URL", "file:./dev.db"),
            Some((AdapterType::Database, "sqlite".to_string()))
        );
        assert_eq!(
            classify_env_var("DATABASE_URL", ""),
            Some((AdapterType::Database, "postgres".to_string()))
        );
    }

    #[test]
    fn test_npm_manifest() {
        let packages = manifest_packages(
            ManifestKind::Npm,
            r#"{"dependencies": {"next": "14.0.0", "stripe": "^14"}, "devDependencies": {"typescript": "5"}}"#,
        )
        .unwrap();
        assert!(packages.contains("stripe"));
        assert!(packages.contains("typescript"));
        assert_eq!(detect_framework(&packages), Some((0, "nextjs")));

        let signals = dependency_signals(&packages, Path::new("package.json"));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].name, "stripe");
        assert_eq!(signals[0].evidence.key, "stripe");
    }

    #[test]
    fn test_npm_manifest_invalid_json() {
        assert!(manifest_packages(ManifestKind::Npm, "{ not json").is_err());
    }

    #[test]
    fn test_cargo_manifest() {
        let packages = manifest_packages(
            ManifestKind::Cargo,
            r#"
[package]
name = "api"

[dependencies]
axum = "0.7"
tokio-postgres = "0.7"
async-stripe = { version = "0.34", features = ["runtime-tokio-hyper"] }
"#,
        )
        .unwrap();
        assert_eq!(classify_package("tokio-postgres"), Some((AdapterType::Database, "postgres")));
        assert!(packages.contains("async-stripe"));
        assert_eq!(detect_framework(&packages).map(|(_, f)| f), Some("axum"));
    }

    #[test]
    fn test_pip_manifest() {
        let packages = manifest_packages(
            ManifestKind::Pip,
            "# deps\nDjango>=4.2\nstripe==7.0.0  # payments\n-r base.txt\nsentry-sdk[django]\n",
        )
        .unwrap();
        assert!(packages.contains("django"));
        assert!(packages.contains("stripe"));
        assert!(packages.contains("sentry-sdk"));
        assert_eq!(packages.len(), 3);
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fmt;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub object_store: ObjectStoreConfig,
}

/// Connection and signing material for the external object store.
///
/// The access/secret keys are only ever used locally to sign grants; this
/// process never calls the store itself.
#[derive(Clone)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub grant_ttl_secs: u32,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Startup logs print the config; keep the secret out of them.
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("grant_ttl_secs", &self.grant_ttl_secs)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File catalog and access-grant API")]
pub struct Args {
    /// Host to bind to (overrides FILE_CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_CATALOG_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides FILE_CATALOG_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object-store endpoint (overrides FILE_CATALOG_STORE_ENDPOINT)
    #[arg(long)]
    pub store_endpoint: Option<String>,

    /// Object-store bucket (overrides FILE_CATALOG_STORE_BUCKET)
    #[arg(long)]
    pub store_bucket: Option<String>,

    /// Object-store region (overrides FILE_CATALOG_STORE_REGION)
    #[arg(long)]
    pub store_region: Option<String>,

    /// Grant validity window in seconds (overrides FILE_CATALOG_GRANT_TTL_SECS)
    #[arg(long)]
    pub grant_ttl_secs: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    ///
    /// Store credentials are environment-only so they never land in shell
    /// history or process listings.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_CATALOG_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env_u16("FILE_CATALOG_PORT", 3000)?;
        let env_db = env::var("FILE_CATALOG_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/file_catalog.db".into());
        let env_endpoint = env::var("FILE_CATALOG_STORE_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".into());
        let env_bucket = env::var("FILE_CATALOG_STORE_BUCKET").unwrap_or_else(|_| "files".into());
        let env_region =
            env::var("FILE_CATALOG_STORE_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access_key = env::var("FILE_CATALOG_STORE_ACCESS_KEY").unwrap_or_default();
        let secret_key = env::var("FILE_CATALOG_STORE_SECRET_KEY").unwrap_or_default();
        let env_ttl = parse_env_u32("FILE_CATALOG_GRANT_TTL_SECS", 300)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            object_store: ObjectStoreConfig {
                endpoint: args.store_endpoint.unwrap_or(env_endpoint),
                bucket: args.store_bucket.unwrap_or(env_bucket),
                region: args.store_region.unwrap_or(env_region),
                access_key,
                secret_key,
                grant_ttl_secs: args.grant_ttl_secs.unwrap_or(env_ttl),
            },
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u32>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

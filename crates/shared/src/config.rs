//! Application configuration management.

use serde::Deserialize;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "OBJGATE";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Custom S3 endpoint (MinIO, R2, ...). Unset means AWS.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// S3 region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Static access key ID.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Static secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Domain used to build unsigned public URLs (`{bucket}.{public_domain}`).
    #[serde(default = "default_public_domain")]
    pub public_domain: String,
    /// Presigned URL lifetime in seconds.
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_secs: u64,
    /// Bucket used by callers that do not name one.
    #[serde(default)]
    pub default_bucket: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_public_domain() -> String {
    "s3.amazonaws.com".to_string()
}

fn default_presign_ttl() -> u64 {
    43_200 // 720 minutes
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            public_domain: default_public_domain(),
            presign_ttl_secs: default_presign_ttl(),
            default_bucket: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

//! Storage configuration types.

use std::time::Duration;

use objgate_shared::StorageSettings;
use serde::{Deserialize, Serialize};

/// Connection settings shared by every per-bucket S3 client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Connection {
    /// Custom endpoint URL (MinIO, Cloudflare R2, ...). `None` targets AWS.
    pub endpoint: Option<String>,
    /// Region used for signing.
    pub region: String,
    /// Static access key ID. Falls back to the ambient credential chain when unset.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
}

impl S3Connection {
    /// Create connection settings for a region, using ambient credentials.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            region: region.into(),
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set a custom endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set static credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

impl From<&StorageSettings> for S3Connection {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            region: settings.region.clone(),
            access_key_id: settings.access_key_id.clone(),
            secret_access_key: settings.secret_access_key.clone(),
        }
    }
}

/// Gateway behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Domain appended to the bucket name in public URLs.
    pub public_domain: String,
    /// Presigned URL lifetime in seconds (default: 43200 = 12 hours).
    pub presign_ttl_secs: u64,
    /// Bucket outer layers fall back to. Never applied by the gateway itself.
    pub default_bucket: Option<String>,
}

impl GatewayConfig {
    /// Default public URL domain.
    pub const DEFAULT_PUBLIC_DOMAIN: &'static str = "s3.amazonaws.com";
    /// Default presign TTL: 720 minutes.
    pub const DEFAULT_PRESIGN_TTL: u64 = 720 * 60;

    /// Create a gateway config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            public_domain: Self::DEFAULT_PUBLIC_DOMAIN.to_string(),
            presign_ttl_secs: Self::DEFAULT_PRESIGN_TTL,
            default_bucket: None,
        }
    }

    /// Set the public URL domain.
    #[must_use]
    pub fn with_public_domain(mut self, domain: impl Into<String>) -> Self {
        self.public_domain = domain.into();
        self
    }

    /// Set the presigned URL lifetime.
    #[must_use]
    pub fn with_presign_ttl(mut self, secs: u64) -> Self {
        self.presign_ttl_secs = secs;
        self
    }

    /// Set the default bucket.
    #[must_use]
    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Presigned URL lifetime as a [`Duration`].
    #[must_use]
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&StorageSettings> for GatewayConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            public_domain: settings.public_domain.clone(),
            presign_ttl_secs: settings.presign_ttl_secs,
            default_bucket: settings.default_bucket.clone(),
        }
    }
}

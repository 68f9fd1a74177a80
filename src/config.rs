//! Startup configuration
//!
//! Read once when the process starts; any missing value is fatal.

use crate::error::{Result, SharePointError};
use crate::sharepoint::SharePointContext;
use crate::types::{ClientId, TenantContext, TenantId};

/// Credentials and default targets
#[derive(Clone)]
pub struct Config {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    pub drive_id: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("drive_id", &self.drive_id)
            .finish()
    }
}

impl Config {
    /// Reject blank settings, naming the environment variable to fix
    pub fn validate(&self) -> Result<()> {
        let settings = [
            ("TENANT_ID", &self.tenant_id),
            ("CLIENT_ID", &self.client_id),
            ("CLIENT_SECRET", &self.client_secret),
            ("SITE_ID", &self.site_id),
            ("DRIVE_ID", &self.drive_id),
        ];
        let missing: Vec<&str> = settings
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SharePointError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn tenant_context(&self) -> Result<TenantContext> {
        TenantContext::new(
            TenantId::new(self.tenant_id.as_str())?,
            ClientId::new(self.client_id.as_str())?,
            self.client_secret.as_str(),
        )
    }

    /// Build the tenant context and default site/drive references
    pub fn context(&self) -> Result<SharePointContext> {
        self.validate()?;
        SharePointContext::new(self.tenant_context()?, &self.site_id, &self.drive_id)
    }
}

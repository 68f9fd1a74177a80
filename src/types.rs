//! Identity model and remote entities
//!
//! References are pure addressing values: tenant context → site → drive →
//! drive item. Building one never performs I/O and never mutates its parent;
//! the gateway resolves them lazily.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SharePointError};

/// Opaque bag of remote metadata passed through unmodified
pub type ExtraFields = Map<String, Value>;

fn validate_identifier(kind: &str, raw: String) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(SharePointError::InvalidIdentifier(format!(
            "{} must not be empty",
            kind
        )));
    }
    Ok(raw)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier
            pub fn new(raw: impl Into<String>) -> Result<Self> {
                validate_identifier($label, raw.into()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = SharePointError;

            fn try_from(raw: String) -> Result<Self> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Directory tenant identifier
    TenantId,
    "tenant id"
);
identifier!(
    /// Application (client) identifier
    ClientId,
    "client id"
);
identifier!(
    /// SharePoint site identifier
    SiteId,
    "site id"
);
identifier!(
    /// Document library identifier
    DriveId,
    "drive id"
);
identifier!(
    /// File or folder identifier
    DriveItemId,
    "drive item id"
);

/// Authenticated-session handle, built once at startup and shared read-only
#[derive(Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    client_id: ClientId,
    client_secret: String,
}

impl TenantContext {
    pub fn new(
        tenant_id: TenantId,
        client_id: ClientId,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let client_secret = client_secret.into();
        if client_secret.trim().is_empty() {
            return Err(SharePointError::InvalidIdentifier(
                "client secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A SharePoint site bound to a tenant context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteReference {
    context: Arc<TenantContext>,
    site_id: SiteId,
}

impl SiteReference {
    pub fn new(context: &Arc<TenantContext>, site_id: SiteId) -> Self {
        Self {
            context: Arc::clone(context),
            site_id,
        }
    }

    /// Bind a raw site identifier to a context
    pub fn parse(context: &Arc<TenantContext>, site_id: impl Into<String>) -> Result<Self> {
        Ok(Self::new(context, SiteId::new(site_id)?))
    }

    pub fn context(&self) -> &Arc<TenantContext> {
        &self.context
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    /// Derive a document library reference within this site
    pub fn drive(&self, drive_id: impl Into<String>) -> Result<DriveReference> {
        Ok(DriveReference::new(self, DriveId::new(drive_id)?))
    }
}

/// A document library within a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveReference {
    site: SiteReference,
    drive_id: DriveId,
}

impl DriveReference {
    pub fn new(site: &SiteReference, drive_id: DriveId) -> Self {
        Self {
            site: site.clone(),
            drive_id,
        }
    }

    pub fn site(&self) -> &SiteReference {
        &self.site
    }

    pub fn drive_id(&self) -> &DriveId {
        &self.drive_id
    }

    /// Derive a file or folder reference within this drive
    pub fn item(&self, item_id: impl Into<String>) -> Result<DriveItemReference> {
        Ok(DriveItemReference::new(self, DriveItemId::new(item_id)?))
    }
}

/// A file or folder within a drive; built per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveItemReference {
    drive: DriveReference,
    item_id: DriveItemId,
}

impl DriveItemReference {
    pub fn new(drive: &DriveReference, item_id: DriveItemId) -> Self {
        Self {
            drive: drive.clone(),
            item_id,
        }
    }

    pub fn drive(&self) -> &DriveReference {
        &self.drive
    }

    pub fn item_id(&self) -> &DriveItemId {
        &self.item_id
    }
}

/// Anything that can hold drive items: a drive root or a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerReference {
    Drive(DriveReference),
    Folder(DriveItemReference),
}

impl ContainerReference {
    pub fn drive(&self) -> &DriveReference {
        match self {
            ContainerReference::Drive(drive) => drive,
            ContainerReference::Folder(item) => item.drive(),
        }
    }

    /// The folder id, or `None` for a drive root
    pub fn folder_id(&self) -> Option<&DriveItemId> {
        match self {
            ContainerReference::Drive(_) => None,
            ContainerReference::Folder(item) => Some(item.item_id()),
        }
    }
}

impl From<DriveReference> for ContainerReference {
    fn from(drive: DriveReference) -> Self {
        ContainerReference::Drive(drive)
    }
}

impl From<DriveItemReference> for ContainerReference {
    fn from(item: DriveItemReference) -> Self {
        ContainerReference::Folder(item)
    }
}

/// A file or folder as returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Size, mime type, timestamps, parent reference, facets...
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl DriveItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: ExtraFields::new(),
        }
    }

    /// Graph marks folders with a `folder` facet
    pub fn is_folder(&self) -> bool {
        self.extra.contains_key("folder")
    }
}

/// A SharePoint site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Metadata of a SharePoint list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    pub id: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Arc<TenantContext> {
        Arc::new(
            TenantContext::new(
                TenantId::new("tenant").unwrap(),
                ClientId::new("client").unwrap(),
                "secret",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(matches!(
            SiteId::new(""),
            Err(SharePointError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            DriveItemId::new("   "),
            Err(SharePointError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_deriving_does_not_touch_parent() {
        let site = SiteReference::parse(&context(), "site-1").unwrap();
        let drive = site.drive("drive-1").unwrap();
        let before = drive.clone();

        let item = drive.item("item-1").unwrap();

        assert_eq!(drive, before);
        assert_eq!(item.drive(), &drive);
        assert_eq!(item.item_id().as_str(), "item-1");
    }

    #[test]
    fn test_structural_equality() {
        let ctx = context();
        let a = SiteReference::parse(&ctx, "s").unwrap().drive("d").unwrap();
        let b = SiteReference::parse(&ctx, "s").unwrap().drive("d").unwrap();
        let c = SiteReference::parse(&ctx, "s").unwrap().drive("e").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_secret_not_in_debug() {
        let rendered = format!("{:?}", context());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_container_folder_id() {
        let drive = SiteReference::parse(&context(), "s").unwrap().drive("d").unwrap();
        let root: ContainerReference = drive.clone().into();
        let folder: ContainerReference = drive.item("f").unwrap().into();
        assert!(root.folder_id().is_none());
        assert_eq!(folder.folder_id().map(|id| id.as_str()), Some("f"));
        assert_eq!(folder.drive(), &drive);
    }

    #[test]
    fn test_drive_item_keeps_unknown_fields() {
        let raw = json!({
            "id": "1",
            "name": "a.txt",
            "size": 42,
            "file": {"mimeType": "text/plain"}
        });
        let item: DriveItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.name, "a.txt");
        assert!(!item.is_folder());
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_identifier_deserialize_validates() {
        let parsed: std::result::Result<DriveId, _> = serde_json::from_value(json!(""));
        assert!(parsed.is_err());
    }
}

//! Remote operation gateway
//!
//! The narrow contract the registries consume. Implementations own auth,
//! HTTP, pagination and timeouts; nothing here retries.

pub mod memory;

#[cfg(feature = "graph")]
pub mod graph;

use async_trait::async_trait;

use crate::error::{Result, SharePointError};
use crate::types::{
    ContainerReference, DriveItem, DriveItemReference, ListMeta, Site, SiteReference,
    TenantContext,
};

pub use memory::{FailureMode, MemoryGateway};

#[cfg(feature = "graph")]
pub use graph::{GraphConfig, GraphGateway};

/// Microsoft Graph v1.0 root
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
/// Microsoft identity platform authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Operations against the remote document-management API
///
/// Every operation may fail with [`SharePointError::Unauthorized`] when the
/// credentials are rejected and [`SharePointError::Unavailable`] on transient
/// network or service failures.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Immediate children of a drive root or folder; empty containers are `Ok(vec![])`
    async fn list_children(&self, container: &ContainerReference) -> Result<Vec<DriveItem>>;

    /// Fetch one item, `NotFound` if the id does not resolve
    async fn get_item(&self, item: &DriveItemReference) -> Result<DriveItem>;

    async fn list_sites(&self, context: &TenantContext) -> Result<Vec<Site>>;

    async fn list_lists(&self, site: &SiteReference) -> Result<Vec<ListMeta>>;

    /// Free-text search over the container's subtree.
    ///
    /// An empty or whitespace-only query is "no filter" and returns every
    /// item below the container.
    async fn search(&self, container: &ContainerReference, query: &str)
        -> Result<Vec<DriveItem>>;

    /// Create a folder, failing with `AlreadyExists` if a sibling has the
    /// same name and `InvalidName` for blank names.
    async fn create_folder(&self, container: &ContainerReference, name: &str)
        -> Result<DriveItem>;
}

/// Validate a folder name and return it trimmed
pub fn validate_folder_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SharePointError::InvalidName(
            "folder name must not be empty".to_string(),
        ));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(SharePointError::InvalidName(format!(
            "folder name '{}' must not contain path separators",
            trimmed
        )));
    }
    Ok(trimmed)
}

/// True when the query is empty after trimming
pub fn is_unfiltered(query: &str) -> bool {
    query.trim().is_empty()
}

/// Case-insensitive substring match on the item name
pub fn matches_query(item: &DriveItem, query: &str) -> bool {
    if is_unfiltered(query) {
        return true;
    }
    item.name
        .to_lowercase()
        .contains(&query.trim().to_lowercase())
}

/// SharePoint compares sibling names case-insensitively
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

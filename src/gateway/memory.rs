//! In-memory gateway
//!
//! Holds sites, lists and drive trees in process. Used by tests, benches and
//! the `--backend memory` mode of the server binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;

use super::{matches_query, same_name, validate_folder_name, Gateway};
use crate::error::{Result, SharePointError};
use crate::types::{
    ContainerReference, DriveItem, DriveItemReference, ListMeta, Site, SiteReference,
    TenantContext,
};

/// Simulated remote failure applied to every call while armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Unauthorized,
    Unavailable,
}

impl FailureMode {
    fn to_error(self) -> SharePointError {
        match self {
            FailureMode::Unauthorized => {
                SharePointError::Unauthorized("credentials rejected".to_string())
            }
            FailureMode::Unavailable => {
                SharePointError::Unavailable("service temporarily unavailable".to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    item: DriveItem,
    parent: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    sites: Vec<Site>,
    lists: HashMap<String, Vec<ListMeta>>,
    /// Drive id -> items in insertion order
    drives: HashMap<String, Vec<StoredItem>>,
    failure: Option<FailureMode>,
}

/// Gateway backed by process memory
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: RwLock<State>,
    calls: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of gateway operations invoked so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail until cleared with `None`
    pub fn set_failure(&self, failure: Option<FailureMode>) {
        self.state.write().failure = failure;
    }

    /// Register an empty drive
    pub fn add_drive(&self, drive_id: &str) {
        self.state
            .write()
            .drives
            .entry(drive_id.to_string())
            .or_default();
    }

    /// Add items under `parent` (or the drive root), creating the drive if needed
    pub fn add_items(&self, drive_id: &str, parent: Option<&str>, items: Vec<DriveItem>) {
        let mut state = self.state.write();
        let drive = state.drives.entry(drive_id.to_string()).or_default();
        drive.extend(items.into_iter().map(|item| StoredItem {
            item,
            parent: parent.map(str::to_string),
        }));
    }

    pub fn add_site(&self, site: Site) {
        self.state.write().sites.push(site);
    }

    pub fn add_lists(&self, site_id: &str, lists: Vec<ListMeta>) {
        self.state
            .write()
            .lists
            .entry(site_id.to_string())
            .or_default()
            .extend(lists);
    }

    fn begin(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.state.read().failure {
            Some(mode) => Err(mode.to_error()),
            None => Ok(()),
        }
    }

    fn drive<'a>(state: &'a State, container: &ContainerReference) -> Result<&'a [StoredItem]> {
        let drive_id = container.drive().drive_id().as_str();
        let items = state
            .drives
            .get(drive_id)
            .ok_or_else(|| SharePointError::NotFound(format!("drive {}", drive_id)))?;

        if let Some(folder_id) = container.folder_id() {
            if !items.iter().any(|stored| stored.item.id == folder_id.as_str()) {
                return Err(SharePointError::NotFound(format!(
                    "item {} in drive {}",
                    folder_id, drive_id
                )));
            }
        }
        Ok(items)
    }

    fn children<'a>(
        items: &'a [StoredItem],
        parent: Option<&'a str>,
    ) -> impl Iterator<Item = &'a StoredItem> + 'a {
        items
            .iter()
            .filter(move |stored| stored.parent.as_deref() == parent)
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list_children(&self, container: &ContainerReference) -> Result<Vec<DriveItem>> {
        self.begin()?;
        let state = self.state.read();
        let items = Self::drive(&state, container)?;
        let parent = container.folder_id().map(|id| id.as_str());
        Ok(Self::children(items, parent)
            .map(|stored| stored.item.clone())
            .collect())
    }

    async fn get_item(&self, item: &DriveItemReference) -> Result<DriveItem> {
        self.begin()?;
        let state = self.state.read();
        let drive_id = item.drive().drive_id().as_str();
        state
            .drives
            .get(drive_id)
            .and_then(|items| {
                items
                    .iter()
                    .find(|stored| stored.item.id == item.item_id().as_str())
            })
            .map(|stored| stored.item.clone())
            .ok_or_else(|| {
                SharePointError::NotFound(format!("item {} in drive {}", item.item_id(), drive_id))
            })
    }

    async fn list_sites(&self, _context: &TenantContext) -> Result<Vec<Site>> {
        self.begin()?;
        Ok(self.state.read().sites.clone())
    }

    async fn list_lists(&self, site: &SiteReference) -> Result<Vec<ListMeta>> {
        self.begin()?;
        Ok(self
            .state
            .read()
            .lists
            .get(site.site_id().as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn search(
        &self,
        container: &ContainerReference,
        query: &str,
    ) -> Result<Vec<DriveItem>> {
        self.begin()?;
        let state = self.state.read();
        let items = Self::drive(&state, container)?;

        // Depth-first walk of the container's subtree
        let mut results = Vec::new();
        let mut pending = vec![container.folder_id().map(|id| id.as_str().to_string())];
        while let Some(parent) = pending.pop() {
            for stored in Self::children(items, parent.as_deref()) {
                if matches_query(&stored.item, query) {
                    results.push(stored.item.clone());
                }
                pending.push(Some(stored.item.id.clone()));
            }
        }
        Ok(results)
    }

    async fn create_folder(
        &self,
        container: &ContainerReference,
        name: &str,
    ) -> Result<DriveItem> {
        self.begin()?;
        let name = validate_folder_name(name)?;

        let mut state = self.state.write();
        Self::drive(&state, container)?;
        let drive_id = container.drive().drive_id().as_str().to_string();
        let parent = container.folder_id().map(|id| id.as_str().to_string());

        let items = state.drives.entry(drive_id.clone()).or_default();
        if Self::children(items, parent.as_deref()).any(|stored| same_name(&stored.item.name, name))
        {
            return Err(SharePointError::AlreadyExists(format!(
                "an item named '{}' already exists in this folder",
                name
            )));
        }

        let mut folder = DriveItem::new(uuid::Uuid::new_v4().to_string(), name);
        folder
            .extra
            .insert("folder".to_string(), json!({"childCount": 0}));
        folder
            .extra
            .insert("createdDateTime".to_string(), json!(Utc::now().to_rfc3339()));
        folder.extra.insert(
            "parentReference".to_string(),
            json!({"driveId": drive_id, "id": parent}),
        );

        items.push(StoredItem {
            item: folder.clone(),
            parent,
        });
        tracing::debug!(id = %folder.id, name = %folder.name, "created folder");
        Ok(folder)
    }
}

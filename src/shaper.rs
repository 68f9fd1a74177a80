//! Response shaping
//!
//! Turns heterogeneous remote entities into uniform entries carrying a
//! stable protocol URI, a label and the untouched entity as payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{DriveItem, ListMeta, Site};

/// URI scheme used for every addressable entry
pub const URI_SCHEME: &str = "sharepoint";

/// Entity category, each with its own URI path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DriveItem,
    Site,
    List,
}

impl Category {
    pub fn path(&self) -> &'static str {
        match self {
            Category::DriveItem => "drive",
            Category::Site => "sites",
            Category::List => "lists",
        }
    }

    /// `sharepoint://<path>/<id>`
    pub fn uri_for(&self, id: &str) -> String {
        format!("{}://{}/{}", URI_SCHEME, self.path(), id)
    }
}

/// Uniform response entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub uri: String,
    pub label: String,
    pub payload: Value,
}

/// Remote entity that can be shaped into an [`Entry`]
pub trait Shape: Serialize {
    const CATEGORY: Category;

    fn id(&self) -> &str;

    /// Human-readable name, if the remote API supplied one
    fn display_name(&self) -> Option<&str>;
}

impl Shape for DriveItem {
    const CATEGORY: Category = Category::DriveItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> Option<&str> {
        Some(self.name.as_str())
    }
}

impl Shape for Site {
    const CATEGORY: Category = Category::Site;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }
}

impl Shape for ListMeta {
    const CATEGORY: Category = Category::List;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }
}

/// Shape a single entity; the label falls back to the id
pub fn shape<T: Shape>(entity: &T) -> Result<Entry> {
    let label = match entity.display_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => entity.id().to_string(),
    };

    Ok(Entry {
        uri: T::CATEGORY.uri_for(entity.id()),
        label,
        payload: serde_json::to_value(entity)?,
    })
}

/// Shape a sequence of entities, preserving order
pub fn shape_all<T: Shape>(entities: &[T]) -> Result<Vec<Entry>> {
    entities.iter().map(shape).collect()
}

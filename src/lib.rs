//! SharePoint MCP - SharePoint over the Model Context Protocol
//!
//! Exposes drive items, sites and lists as MCP resources and folder search
//! and creation as MCP tools, served as JSON-RPC over stdio.

pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod shaper;
pub mod sharepoint;
pub mod types;

pub use config::Config;
pub use error::{Result, SharePointError};
pub use gateway::{Gateway, MemoryGateway};
pub use shaper::{Category, Entry};
pub use sharepoint::SharePointContext;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! SharePoint resources and tools
//!
//! Binds the gateway operations to protocol names. Everything is built from
//! an explicit [`SharePointContext`]; there is no global state.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::gateway::Gateway;
use crate::mcp::resources::{ResourceRegistry, TemplateParams};
use crate::mcp::tools::{parse_args, ArgType, ArgumentSchema, ToolOutput, ToolRegistry};
use crate::shaper::{shape, shape_all};
use crate::types::{ContainerReference, DriveReference, SiteReference, TenantContext};

pub const DRIVE_ITEMS_RESOURCE: &str = "sharepoint.drive.items";
pub const SITES_RESOURCE: &str = "sharepoint.sites";
pub const LISTS_RESOURCE: &str = "sharepoint.lists";
pub const SEARCH_FILES_TOOL: &str = "sharepoint.searchFiles";
pub const CREATE_FOLDER_TOOL: &str = "sharepoint.createFolder";

/// Process-wide immutable context: tenant plus default site and drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePointContext {
    tenant: Arc<TenantContext>,
    default_site: SiteReference,
    default_drive: DriveReference,
}

impl SharePointContext {
    pub fn new(tenant: TenantContext, site_id: &str, drive_id: &str) -> Result<Self> {
        let tenant = Arc::new(tenant);
        let default_site = SiteReference::parse(&tenant, site_id)?;
        let default_drive = default_site.drive(drive_id)?;
        Ok(Self {
            tenant,
            default_site,
            default_drive,
        })
    }

    pub fn tenant(&self) -> &Arc<TenantContext> {
        &self.tenant
    }

    pub fn default_site(&self) -> &SiteReference {
        &self.default_site
    }

    pub fn default_drive(&self) -> &DriveReference {
        &self.default_drive
    }

    /// The folder named by `folder_id` in the default drive, or its root
    pub fn container(&self, folder_id: Option<&str>) -> Result<ContainerReference> {
        match folder_id {
            Some(id) => Ok(self.default_drive.item(id)?.into()),
            None => Ok(self.default_drive.clone().into()),
        }
    }
}

/// Register the drive item, site and list listings
pub fn resource_registry(
    context: &SharePointContext,
    gateway: Arc<dyn Gateway>,
) -> Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();

    let ctx = context.clone();
    let gw = Arc::clone(&gateway);
    registry.register(
        DRIVE_ITEMS_RESOURCE,
        "sharepoint://drive/{folderId?}",
        "Files and folders in the default drive, or in the given folder",
        move |params: TemplateParams| {
            let ctx = ctx.clone();
            let gw = Arc::clone(&gw);
            async move {
                let container = ctx.container(params.get("folderId"))?;
                let items = gw.list_children(&container).await?;
                shape_all(&items)
            }
        },
    )?;

    let ctx = context.clone();
    let gw = Arc::clone(&gateway);
    registry.register(
        SITES_RESOURCE,
        "sharepoint://sites",
        "SharePoint sites visible to the application",
        move |_params: TemplateParams| {
            let ctx = ctx.clone();
            let gw = Arc::clone(&gw);
            async move {
                let sites = gw.list_sites(ctx.tenant()).await?;
                shape_all(&sites)
            }
        },
    )?;

    let ctx = context.clone();
    let gw = gateway;
    registry.register(
        LISTS_RESOURCE,
        "sharepoint://lists",
        "Lists of the default site",
        move |_params: TemplateParams| {
            let ctx = ctx.clone();
            let gw = Arc::clone(&gw);
            async move {
                let lists = gw.list_lists(ctx.default_site()).await?;
                shape_all(&lists)
            }
        },
    )?;

    Ok(registry)
}

#[derive(Debug, Deserialize)]
struct SearchFilesArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderArgs {
    folder_name: String,
}

/// Register the search and create-folder tools
pub fn tool_registry(context: &SharePointContext, gateway: Arc<dyn Gateway>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    let ctx = context.clone();
    let gw = Arc::clone(&gateway);
    registry.register(
        SEARCH_FILES_TOOL,
        "Search files and folders in the default drive by name. An empty query returns every item.",
        ArgumentSchema::new().required("query", ArgType::String, "Free-text search query"),
        move |args| {
            let ctx = ctx.clone();
            let gw = Arc::clone(&gw);
            async move {
                let args: SearchFilesArgs = parse_args(args)?;
                let container = ctx.container(None)?;
                let items = gw.search(&container, &args.query).await?;
                Ok(ToolOutput::Entries(shape_all(&items)?))
            }
        },
    )?;

    let ctx = context.clone();
    let gw = gateway;
    registry.register(
        CREATE_FOLDER_TOOL,
        "Create a folder at the root of the default drive. Fails if a sibling with the same name exists.",
        ArgumentSchema::new().required("folderName", ArgType::String, "Name of the new folder"),
        move |args| {
            let ctx = ctx.clone();
            let gw = Arc::clone(&gw);
            async move {
                let args: CreateFolderArgs = parse_args(args)?;
                let container = ctx.container(None)?;
                let folder = gw.create_folder(&container, &args.folder_name).await?;
                tracing::info!(id = %folder.id, name = %folder.name, "folder created");

                let mut entry = shape(&folder)?;
                entry.label = format!("Created folder: {}", folder.name);
                Ok(ToolOutput::Entry(entry))
            }
        },
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharePointError;
    use crate::types::{ClientId, TenantId};

    fn context() -> SharePointContext {
        let tenant = TenantContext::new(
            TenantId::new("tenant").unwrap(),
            ClientId::new("client").unwrap(),
            "secret",
        )
        .unwrap();
        SharePointContext::new(tenant, "site", "drive").unwrap()
    }

    #[test]
    fn test_context_rejects_empty_ids() {
        let tenant = context().tenant().as_ref().clone();
        assert!(matches!(
            SharePointContext::new(tenant, "site", ""),
            Err(SharePointError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_container_fallback() {
        let ctx = context();
        assert_eq!(
            ctx.container(None).unwrap(),
            ContainerReference::Drive(ctx.default_drive().clone())
        );
        let folder = ctx.container(Some("F1")).unwrap();
        assert_eq!(folder.folder_id().map(|id| id.as_str()), Some("F1"));
        assert_eq!(folder.drive(), ctx.default_drive());
    }
}

//! MCP request handler for SharePoint

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, ReadResourceResult,
    ResourceContent, ToolCallResult, ToolContent,
};
use super::resources::ResourceRegistry;
use super::tools::ToolRegistry;
use crate::error::{Result, SharePointError};
use crate::gateway::Gateway;
use crate::shaper::Entry;
use crate::sharepoint::{resource_registry, tool_registry, SharePointContext};

/// Dispatches protocol methods onto the resource and tool registries
pub struct SharePointHandler {
    resources: ResourceRegistry,
    tools: ToolRegistry,
}

impl SharePointHandler {
    pub fn new(resources: ResourceRegistry, tools: ToolRegistry) -> Self {
        Self { resources, tools }
    }

    /// Handler with the standard SharePoint resources and tools
    pub fn for_gateway(context: &SharePointContext, gateway: Arc<dyn Gateway>) -> Result<Self> {
        Ok(Self::new(
            resource_registry(context, Arc::clone(&gateway))?,
            tool_registry(context, gateway)?,
        ))
    }

    async fn read_resource(&self, params: &Value) -> Result<Value> {
        let uri = params
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SharePointError::InvalidArguments("missing 'uri'".to_string()))?;

        let entries = self.resources.read(uri).await?;
        let result = ReadResourceResult {
            contents: entries
                .into_iter()
                .map(|entry| ResourceContent {
                    uri: entry.uri,
                    text: entry.label,
                    extra: Some(entry.payload),
                })
                .collect(),
        };
        Ok(json!(result))
    }

    /// Request errors surface as JSON-RPC errors, remote failures as `isError` results
    async fn call_tool(&self, params: &Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SharePointError::InvalidArguments("missing tool 'name'".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = match self.tools.call(name, arguments).await {
            Ok(output) => ToolCallResult {
                content: output.into_entries().into_iter().map(tool_content).collect(),
                is_error: None,
            },
            Err(e) if e.is_request_error() => return Err(e),
            Err(e) => {
                tracing::warn!(tool = name, kind = e.kind(), "tool call failed: {}", e);
                ToolCallResult::error(&e)
            }
        };
        Ok(json!(result))
    }
}

fn tool_content(entry: Entry) -> ToolContent {
    ToolContent::Text {
        text: entry.label,
        extra: Some(entry.payload),
    }
}

#[async_trait]
impl McpHandler for SharePointHandler {
    async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let result = match request.method.as_str() {
            methods::INITIALIZE => Ok(json!(InitializeResult::default())),
            methods::INITIALIZED | methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => Ok(json!({"tools": self.tools.definitions()})),
            methods::CALL_TOOL => self.call_tool(&request.params).await,
            methods::LIST_RESOURCES => Ok(json!({"resources": self.resources.resources()})),
            methods::LIST_RESOURCE_TEMPLATES => {
                Ok(json!({"resourceTemplates": self.resources.templates()}))
            }
            methods::READ_RESOURCE => self.read_resource(&request.params).await,
            _ => {
                return McpResponse::error(
                    request.id,
                    -32601,
                    format!("Method not found: {}", request.method),
                )
            }
        };

        match result {
            Ok(value) => McpResponse::success(request.id, value),
            Err(e) => {
                if !e.is_request_error() {
                    tracing::warn!(method = %request.method, kind = e.kind(), "request failed: {}", e);
                }
                McpResponse::from_error(request.id, e)
            }
        }
    }
}

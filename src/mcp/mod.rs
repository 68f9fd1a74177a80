//! MCP (Model Context Protocol) server implementation
//!
//! JSON-RPC over stdio exposing SharePoint resources and tools.

pub mod handler;
pub mod protocol;
pub mod resources;
pub mod tools;

pub use handler::SharePointHandler;
pub use protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, McpServer, ToolCallResult,
};
pub use resources::{ResourceRegistry, TemplateParams, UriTemplate};
pub use tools::{ArgType, ArgumentSchema, ToolOutput, ToolRegistry};

//! MCP JSON-RPC protocol implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, SharePointError};

/// MCP JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl McpRequest {
    /// Notifications carry no id and never get a response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// MCP JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// MCP error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create error from SharePointError, keeping the kind as structured data
    pub fn from_error(id: Option<Value>, err: SharePointError) -> Self {
        let mut response = Self::error(id, err.code(), err.to_string());
        if let Some(error) = response.error.as_mut() {
            error.data = Some(json!({"kind": err.kind()}));
        }
        response
    }
}

/// Trait for handling MCP requests
#[async_trait]
pub trait McpHandler: Send + Sync + 'static {
    async fn handle_request(&self, request: McpRequest) -> McpResponse;
}

/// MCP server speaking newline-delimited JSON-RPC
///
/// Each request runs on its own task; responses go through a single writer
/// so lines never interleave.
pub struct McpServer<H>
where
    H: McpHandler,
{
    handler: Arc<H>,
    /// Request id -> (dispatch sequence, cancel signal) of the latest request with that id
    in_flight: Arc<DashMap<String, (u64, oneshot::Sender<()>)>>,
    sequence: AtomicU64,
}

impl<H: McpHandler> McpServer<H> {
    /// Create a new MCP server
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            in_flight: Arc::new(DashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Run the server, reading from stdin and writing to stdout
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests from `reader` until EOF, then drain in-flight calls
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<McpResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut lines = BufReader::new(reader).lines();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request = match serde_json::from_str::<McpRequest>(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    let _ = tx.send(McpResponse::error(None, -32700, format!("Parse error: {}", e)));
                    continue;
                }
            };

            if request.method == methods::CANCELLED {
                self.cancel(&request.params);
                continue;
            }

            tasks.retain(|task| !task.is_finished());
            tasks.push(self.dispatch(request, tx.clone()));
        }

        for task in tasks {
            let _ = task.await;
        }
        drop(tx);

        writer_task
            .await
            .map_err(|e| SharePointError::Internal(format!("writer task failed: {}", e)))?
    }

    fn dispatch(
        &self,
        request: McpRequest,
        tx: mpsc::UnboundedSender<McpResponse>,
    ) -> JoinHandle<()> {
        let key = request.id.as_ref().map(request_key);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(key) = &key {
            if self.in_flight.insert(key.clone(), (seq, cancel_tx)).is_some() {
                tracing::warn!(id = %key, "request id reused while still in flight");
            }
        }

        let handler = Arc::clone(&self.handler);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let method = request.method.clone();
            let notification = request.is_notification();
            tracing::debug!(method = %method, id = ?request.id, "handling request");

            let outcome = tokio::select! {
                response = handler.handle_request(request) => Some(response),
                Ok(()) = cancel_rx => None,
            };

            // A later request may have reused the id; only drop our own entry
            if let Some(key) = &key {
                in_flight.remove_if(key, |_, (entry_seq, _)| *entry_seq == seq);
            }

            match outcome {
                Some(response) if !notification => {
                    let _ = tx.send(response);
                }
                Some(_) => {}
                None => tracing::info!(method = %method, "request cancelled"),
            }
        })
    }

    /// Abort the in-flight request named by `params.requestId`, if any
    fn cancel(&self, params: &Value) {
        let Some(id) = params.get("requestId") else {
            return;
        };
        if let Some((_, (_, cancel))) = self.in_flight.remove(&request_key(id)) {
            let _ = cancel.send(());
        }
    }
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<McpResponse>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Standard MCP methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
    pub const LIST_RESOURCES: &str = "resources/list";
    pub const LIST_RESOURCE_TEMPLATES: &str = "resources/templates/list";
    pub const READ_RESOURCE: &str = "resources/read";
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Concrete resource advertised by `resources/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Resource template advertised by `resources/templates/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplateDefinition {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// MCP initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Server capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
    pub resources: Option<ResourcesCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesCapability {
    pub subscribe: bool,
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                resources: Some(ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: "SharePoint MCP".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        extra: Option<Value>,
    },
}

/// Entry of a `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

impl ToolCallResult {
    /// Create an error result carrying the error kind
    pub fn error(err: &SharePointError) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: err.to_string(),
                extra: Some(json!({"kind": err.kind()})),
            }],
            is_error: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct EchoHandler;

    #[async_trait]
    impl McpHandler for EchoHandler {
        async fn handle_request(&self, request: McpRequest) -> McpResponse {
            match request.method.as_str() {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    McpResponse::success(request.id, json!("late"))
                }
                "brief" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    McpResponse::success(request.id, json!("brief"))
                }
                methods::PING => McpResponse::success(request.id, json!({})),
                _ => McpResponse::error(request.id, -32601, "Method not found".to_string()),
            }
        }
    }

    async fn exchange(input: &str) -> Vec<Value> {
        let server = McpServer::new(EchoHandler);
        let (mut client, server_side) = tokio::io::duplex(1 << 16);
        server.serve(input.as_bytes(), server_side).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_parse_error_response() {
        let responses = exchange("not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert!(responses[0]["id"].is_null());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n"
        );
        let responses = exchange(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_cancelled_request_produces_no_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":"a","method":"slow"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":"a"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"b","method":"ping"}"#,
            "\n"
        );
        let responses = exchange(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_reused_id_stays_cancellable_after_first_finishes() {
        let server = McpServer::new(EchoHandler);
        let (mut input, server_input) = tokio::io::duplex(1 << 16);
        let (server_output, output) = tokio::io::duplex(1 << 16);
        let serving = tokio::spawn(async move { server.serve(server_input, server_output).await });

        input
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"brief\"}\n")
            .await
            .unwrap();
        input
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"slow\"}\n")
            .await
            .unwrap();

        // Wait until the first request with id 1 has completed
        let mut lines = BufReader::new(output).lines();
        let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["result"], "brief");

        input
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\",\"params\":{\"requestId\":1}}\n",
            )
            .await
            .unwrap();
        drop(input);

        let finished = tokio::time::timeout(Duration::from_secs(5), serving).await;
        assert!(finished.is_ok(), "second request with the reused id was not cancelled");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[test]
    fn test_from_error_keeps_kind() {
        let response = McpResponse::from_error(
            Some(json!(7)),
            SharePointError::NoSuchResource("sharepoint://nope".into()),
        );
        let error = response.error.unwrap();
        assert_eq!(error.code, -32002);
        assert_eq!(error.data.unwrap()["kind"], "NoSuchResource");
    }
}

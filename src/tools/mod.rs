//! Tool executors and the registry seam
//!
//! Every tool the agent can dispatch — MCP-backed or in-process — presents
//! the same [`ToolExecutor`] surface, so the chat client and the agent loop
//! never case-split on where a tool lives. [`ToolRegistry`] is the trait the
//! agent borrows: a mapping from tool name to executor plus a dispatch
//! operation. Concrete registries live in [`registry`] (MCP-backed) and
//! [`filtered`] (allow-list view).

pub mod filtered;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::chat::types::{ToolCall, ToolDefinition};
use crate::error::{McpilotError, Result};
use crate::mcp::client::McpClient;
use crate::mcp::types::McpToolInfo;

/// A tool as exposed to the agent and the LLM.
///
/// Names are unique within a registry; registering a duplicate overwrites
/// the prior entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON-Schema document for the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// Build a spec.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

impl From<McpToolInfo> for ToolSpec {
    fn from(info: McpToolInfo) -> Self {
        Self {
            name: info.name,
            description: info.description.unwrap_or_default(),
            parameters: info.input_schema,
        }
    }
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        ToolDefinition::function(&spec.name, &spec.description, spec.parameters.clone())
    }
}

/// Uniform call surface over a mixed tool population.
///
/// Implementations must be safe for concurrent `execute` calls; an
/// MCP-backed executor is, by virtue of the MCP client's request
/// multiplexing.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// The tool's description.
    fn description(&self) -> &str;

    /// The tool's JSON-Schema parameter document.
    fn parameter_schema(&self) -> &serde_json::Value;

    /// Whether this executor handles the given call.
    fn can_handle(&self, call: &ToolCall) -> bool {
        call.tool_name() == self.name()
    }

    /// Run the tool and return its result string.
    ///
    /// # Errors
    ///
    /// Implementation-specific; MCP-backed executors surface timeout and
    /// tool-failure errors from the client.
    async fn execute(&self, call: &ToolCall, timeout: Option<Duration>) -> Result<String>;

    /// This executor's catalogue entry.
    fn as_tool_spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.parameter_schema().clone())
    }
}

/// Executor backed by a tool on an MCP server.
pub struct McpToolExecutor {
    client: Arc<McpClient>,
    spec: ToolSpec,
}

impl McpToolExecutor {
    /// Bind a discovered tool to the client that serves it.
    pub fn new(client: Arc<McpClient>, spec: ToolSpec) -> Self {
        Self { client, spec }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameter_schema(&self) -> &serde_json::Value {
        &self.spec.parameters
    }

    async fn execute(&self, call: &ToolCall, timeout: Option<Duration>) -> Result<String> {
        self.client
            .execute(&self.spec.name, &call.function.arguments, timeout)
            .await
    }
}

/// Handler signature for [`InProcessTool`].
pub type InProcessHandler =
    Box<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Fully in-process executor, for built-ins and tests.
///
/// # Examples
///
/// ```
/// use mcpilot::tools::InProcessTool;
///
/// let tool = InProcessTool::new(
///     "uppercase",
///     "Upper-case the input text",
///     serde_json::json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
///     |args| Box::pin(async move {
///         Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
///     }),
/// );
/// ```
pub struct InProcessTool {
    spec: ToolSpec,
    handler: InProcessHandler,
}

impl InProcessTool {
    /// Build an in-process tool from a name, description, schema, and async
    /// handler. The handler receives the parsed argument object.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: impl Fn(serde_json::Value) -> BoxFuture<'static, Result<String>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            spec: ToolSpec::new(name, description, parameters),
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl ToolExecutor for InProcessTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameter_schema(&self) -> &serde_json::Value {
        &self.spec.parameters
    }

    async fn execute(&self, call: &ToolCall, _timeout: Option<Duration>) -> Result<String> {
        let args: serde_json::Value = if call.function.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                McpilotError::InvalidArgument(format!(
                    "arguments for tool '{}' are not valid JSON: {e}",
                    self.spec.name
                ))
            })?
        };
        (self.handler)(args).await
    }
}

/// The registry seam the agent borrows: discovery plus dispatch.
///
/// Whatever listing a registry produces is exactly what its `execute`
/// accepts — filtering implementations restrict both at once, so the model
/// can never be offered a tool that dispatch would then reject.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Catalogue entries for every visible executor.
    async fn list_tools(&self) -> Vec<ToolSpec>;

    /// Number of visible executors.
    async fn executor_count(&self) -> usize;

    /// Look up the executor for a call, if visible.
    async fn find(&self, call: &ToolCall) -> Option<Arc<dyn ToolExecutor>>;

    /// Dispatch a call to its executor.
    ///
    /// # Errors
    ///
    /// [`McpilotError::NoExecutor`] when no executor is registered under the
    /// call's tool name; [`McpilotError::AccessDenied`] from filtering
    /// implementations.
    async fn execute(&self, call: &ToolCall, timeout: Option<Duration>) -> Result<String>;

    /// Register an executor under its name, overwriting any prior entry.
    async fn register(&self, executor: Arc<dyn ToolExecutor>);

    /// Remove every executor.
    async fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uppercase_tool() -> InProcessTool {
        InProcessTool::new(
            "uppercase",
            "Upper-case the input text",
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
            |args| {
                Box::pin(async move {
                    Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
                })
            },
        )
    }

    #[test]
    fn test_tool_spec_from_mcp_info() {
        let info = McpToolInfo {
            name: "echo".to_string(),
            description: None,
            input_schema: serde_json::json!({ "type": "object" }),
        };
        let spec = ToolSpec::from(info);
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.description, "");
        assert_eq!(spec.parameters["type"], "object");
    }

    #[test]
    fn test_tool_definition_from_spec() {
        let spec = ToolSpec::new("t", "does t", serde_json::json!({ "type": "object" }));
        let def = ToolDefinition::from(&spec);
        assert_eq!(def.function.name, "t");
        assert_eq!(def.function.description.as_deref(), Some("does t"));
    }

    #[test]
    fn test_can_handle_matches_by_name() {
        let tool = uppercase_tool();
        assert!(tool.can_handle(&ToolCall::new("c1", "uppercase", "{}")));
        assert!(!tool.can_handle(&ToolCall::new("c1", "lowercase", "{}")));
    }

    #[tokio::test]
    async fn test_in_process_tool_executes_handler() {
        let tool = uppercase_tool();
        let call = ToolCall::new("c1", "uppercase", r#"{"text":"hi"}"#);
        assert_eq!(tool.execute(&call, None).await.unwrap(), "HI");
    }

    #[tokio::test]
    async fn test_in_process_tool_empty_arguments_become_object() {
        let tool = uppercase_tool();
        let call = ToolCall::new("c1", "uppercase", "");
        assert_eq!(tool.execute(&call, None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_in_process_tool_rejects_malformed_arguments() {
        let tool = uppercase_tool();
        let call = ToolCall::new("c1", "uppercase", "{nope");
        let result = tool.execute(&call, None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_as_tool_spec_round_trips_fields() {
        let tool = uppercase_tool();
        let spec = tool.as_tool_spec();
        assert_eq!(spec.name, "uppercase");
        assert_eq!(spec.description, "Upper-case the input text");
        assert_eq!(spec.parameters["required"][0], "text");
    }
}

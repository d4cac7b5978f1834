//! Allow-list view over a tool registry
//!
//! [`FilteredRegistry`] wraps another registry and restricts discovery and
//! execution at one choke point. Because the registry is also what the
//! agent hands to the chat client as the tool catalogue, filtering here
//! guarantees that what the model sees, what lookup resolves, and what
//! dispatch accepts all agree.
//!
//! The filter is a view, not a second store: registration and clearing
//! delegate straight to the source, so multiple agents with different
//! allow-lists can observe one registry without desynchronizing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::types::ToolCall;
use crate::error::{McpilotError, Result};
use crate::tools::{ToolExecutor, ToolRegistry, ToolSpec};

/// Composable allow-list wrapper.
///
/// - `allowed = None`: identity over the source.
/// - `allowed = Some(∅)`: empty listing; every execute is access-denied.
/// - otherwise: listing is the source intersected with `allowed`, and
///   execute fails with access-denied for any name outside it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mcpilot::tools::filtered::FilteredRegistry;
/// use mcpilot::tools::registry::McpToolRegistry;
///
/// let source = Arc::new(McpToolRegistry::new());
/// let view = FilteredRegistry::new(source, Some(["get_weather".to_string()].into()));
/// assert!(view.is_allowed("get_weather"));
/// assert!(!view.is_allowed("mock_tool"));
/// ```
pub struct FilteredRegistry {
    source: Arc<dyn ToolRegistry>,
    allowed: Option<HashSet<String>>,
}

impl FilteredRegistry {
    /// Wrap `source` with an optional allow-set.
    pub fn new(source: Arc<dyn ToolRegistry>, allowed: Option<HashSet<String>>) -> Self {
        Self { source, allowed }
    }

    /// Whether a tool name passes the filter.
    pub fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.contains(name),
        }
    }

    /// The allow-set, `None` meaning unrestricted.
    pub fn allowed(&self) -> Option<&HashSet<String>> {
        self.allowed.as_ref()
    }
}

#[async_trait]
impl ToolRegistry for FilteredRegistry {
    async fn list_tools(&self) -> Vec<ToolSpec> {
        let tools = self.source.list_tools().await;
        match &self.allowed {
            None => tools,
            Some(allowed) => tools
                .into_iter()
                .filter(|spec| allowed.contains(&spec.name))
                .collect(),
        }
    }

    async fn executor_count(&self) -> usize {
        self.list_tools().await.len()
    }

    async fn find(&self, call: &ToolCall) -> Option<Arc<dyn ToolExecutor>> {
        if !self.is_allowed(call.tool_name()) {
            return None;
        }
        self.source.find(call).await
    }

    async fn execute(&self, call: &ToolCall, timeout: Option<Duration>) -> Result<String> {
        if !self.is_allowed(call.tool_name()) {
            return Err(McpilotError::AccessDenied(format!(
                "tool '{}' is outside this registry's allow-list",
                call.tool_name()
            ))
            .into());
        }
        self.source.execute(call, timeout).await
    }

    async fn register(&self, executor: Arc<dyn ToolExecutor>) {
        self.source.register(executor).await;
    }

    async fn clear(&self) {
        self.source.clear().await;
    }
}

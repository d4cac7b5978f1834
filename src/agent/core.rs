//! The agent conversation loop
//!
//! [`Agent`] drives one conversation: it anchors the system prompt, appends
//! the user message, and iterates chat → tool-call → tool-result cycles
//! until the model emits a terminal text reply. Tool-execution failures are
//! converted into tool messages and fed back to the model, which may recover
//! or give up; policy violations (access-denied) and the round bound
//! (runaway-loop) terminate the turn as raised errors.

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::transcript::Transcript;
use crate::chat::client::ChatApi;
use crate::chat::decoding::DecodingConfig;
use crate::chat::types::{ChatMessage, ToolCall, ToolDefinition};
use crate::error::{McpilotError, Result};
use crate::tools::ToolRegistry;

/// Upper bound on chat requests per user turn.
pub const MAX_ROUNDS: usize = 40;

/// A per-conversation driver over a chat client and a tool registry.
///
/// The agent owns its transcript; the registry and chat client are shared.
/// Multiple agents may run concurrently against one registry and the
/// process-wide server manager.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcpilot::agent::Agent;
/// use mcpilot::chat::{DecodingConfig, HttpChatClient};
/// use mcpilot::tools::registry::McpToolRegistry;
///
/// # async fn example() -> mcpilot::error::Result<()> {
/// let chat = Arc::new(HttpChatClient::new("https://api.deepseek.com", "sk-...")?);
/// let registry = Arc::new(McpToolRegistry::new());
/// let mut agent = Agent::new(chat, registry, "You are a helpful assistant.", DecodingConfig::default());
/// let reply = agent.send_message("What's the weather in Hangzhou?", None).await?;
/// println!("{}", reply.content.unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    chat: Arc<dyn ChatApi>,
    registry: Arc<dyn ToolRegistry>,
    transcript: Transcript,
    system_prompt: String,
    decoding: DecodingConfig,
    /// Additional allow-list applied below the model, on top of whatever
    /// filtering the registry itself performs.
    allowed: Option<HashSet<String>>,
}

impl Agent {
    /// Create an agent with no tool allow-list of its own.
    pub fn new(
        chat: Arc<dyn ChatApi>,
        registry: Arc<dyn ToolRegistry>,
        system_prompt: impl Into<String>,
        decoding: DecodingConfig,
    ) -> Self {
        Self {
            chat,
            registry,
            transcript: Transcript::new(),
            system_prompt: system_prompt.into(),
            decoding,
            allowed: None,
        }
    }

    /// Create an agent restricted to `allowed` tool names.
    ///
    /// # Errors
    ///
    /// Returns [`McpilotError::InvalidArgument`] if any allowed name is
    /// absent from the registry's current listing; an allow-list naming a
    /// tool that cannot exist is a configuration mistake, not a policy.
    pub async fn with_allowed_tools(
        chat: Arc<dyn ChatApi>,
        registry: Arc<dyn ToolRegistry>,
        system_prompt: impl Into<String>,
        decoding: DecodingConfig,
        allowed: HashSet<String>,
    ) -> Result<Self> {
        let known: HashSet<String> = registry
            .list_tools()
            .await
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        for name in &allowed {
            if !known.contains(name) {
                return Err(McpilotError::InvalidArgument(format!(
                    "allowed tool '{name}' is not present in the registry"
                ))
                .into());
            }
        }

        let mut agent = Self::new(chat, registry, system_prompt, decoding);
        agent.allowed = Some(allowed);
        Ok(agent)
    }

    /// Send one user message and drive the loop to a terminal assistant
    /// reply.
    ///
    /// `config_override` replaces the agent's decoding config for this turn
    /// only.
    ///
    /// # Errors
    ///
    /// - [`McpilotError::AccessDenied`] when the model names a tool outside
    ///   the agent's allow-list.
    /// - [`McpilotError::RunawayLoop`] after [`MAX_ROUNDS`] chat rounds; the
    ///   transcript is repaired (every tool call answered) before the error
    ///   is raised.
    /// - Upstream and validation errors from the chat client.
    pub async fn send_message(
        &mut self,
        user_text: &str,
        config_override: Option<&DecodingConfig>,
    ) -> Result<ChatMessage> {
        self.transcript.anchor_system_prompt(&self.system_prompt);
        self.transcript.push(ChatMessage::user(user_text));

        let config = config_override.unwrap_or(&self.decoding).clone();
        let mut rounds = 0usize;

        loop {
            let tools: Vec<ToolDefinition> = self
                .registry
                .list_tools()
                .await
                .iter()
                .map(ToolDefinition::from)
                .collect();

            let reply = self
                .chat
                .chat(self.transcript.messages(), &tools, Some(&config))
                .await?;
            self.transcript.push(reply.clone());

            if !reply.has_tool_calls() {
                return Ok(reply);
            }

            rounds += 1;
            if rounds >= MAX_ROUNDS {
                self.abort_tool_call_prefix();
                return Err(McpilotError::RunawayLoop { limit: MAX_ROUNDS }.into());
            }

            let calls: Vec<ToolCall> = reply.tool_calls().to_vec();
            self.validate_tool_access(&calls)?;

            for call in &calls {
                let content = match self.registry.execute(call, None).await {
                    Ok(result) => result,
                    // Fed back to the model rather than raised; the model
                    // may retry or give up on its own.
                    Err(e) => format!("Tool execution failed: {e}"),
                };
                self.transcript.push_tool_result(&call.id, content);
            }
        }
    }

    /// Reject any call whose tool name is outside the agent's allow-list.
    ///
    /// This check sits below the model: the model only sees the registry's
    /// filtered catalogue, so a violation here means it hallucinated a tool
    /// name.
    fn validate_tool_access(&self, calls: &[ToolCall]) -> Result<()> {
        let Some(allowed) = &self.allowed else {
            return Ok(());
        };
        for call in calls {
            if !allowed.contains(call.tool_name()) {
                return Err(McpilotError::AccessDenied(format!(
                    "tool '{}' is not permitted for this agent",
                    call.tool_name()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Repair the transcript after the round bound fires.
    ///
    /// The offending assistant message has unanswered tool-call ids; left
    /// dangling they would make the transcript unusable as input to any
    /// future chat request. Synthesize a tool reply for each, then a
    /// closing assistant message.
    fn abort_tool_call_prefix(&mut self) {
        let unanswered = self.transcript.unanswered_calls_of_last_assistant();
        for call in &unanswered {
            self.transcript.push_tool_result(
                &call.id,
                format!(
                    "Tool execution was terminated: the conversation exceeded the \
                     {MAX_ROUNDS}-round limit before this call could run."
                ),
            );
        }
        self.transcript.push(ChatMessage::assistant(format!(
            "The conversation was terminated after exceeding the {MAX_ROUNDS}-round \
             tool-call limit."
        )));
    }

    /// Remove every non-system message from the transcript.
    pub fn clear_conversation(&mut self) {
        self.transcript.clear_conversation();
    }

    /// The transcript so far.
    pub fn transcript(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    /// Replace the system prompt; takes effect on the next send.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// The current system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The agent's decoding configuration.
    pub fn decoding(&self) -> &DecodingConfig {
        &self.decoding
    }

    /// Current sampling temperature.
    pub fn temperature(&self) -> f64 {
        self.decoding.temperature
    }

    /// Set the sampling temperature.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.decoding.temperature = temperature;
    }

    /// Current nucleus-sampling mass.
    pub fn top_p(&self) -> f64 {
        self.decoding.top_p
    }

    /// Set the nucleus-sampling mass.
    pub fn set_top_p(&mut self, top_p: f64) {
        self.decoding.top_p = top_p;
    }

    /// Current completion token budget.
    pub fn max_tokens(&self) -> u32 {
        self.decoding.max_tokens
    }

    /// Set the completion token budget.
    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.decoding.max_tokens = max_tokens;
    }

    /// Current frequency penalty.
    pub fn frequency_penalty(&self) -> f64 {
        self.decoding.frequency_penalty
    }

    /// Set the frequency penalty.
    pub fn set_frequency_penalty(&mut self, frequency_penalty: f64) {
        self.decoding.frequency_penalty = frequency_penalty;
    }

    /// Current presence penalty.
    pub fn presence_penalty(&self) -> f64 {
        self.decoding.presence_penalty
    }

    /// Set the presence penalty.
    pub fn set_presence_penalty(&mut self, presence_penalty: f64) {
        self.decoding.presence_penalty = presence_penalty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::McpToolRegistry;
    use crate::tools::InProcessTool;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Chat stub that replays a fixed script of assistant messages.
    struct ScriptedChat {
        responses: Mutex<Vec<ChatMessage>>,
        calls: AtomicUsize,
    }

    impl ScriptedChat {
        fn new(responses: Vec<ChatMessage>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatApi for ScriptedChat {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _decoding: Option<&DecodingConfig>,
        ) -> Result<ChatMessage> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let responses = self.responses.lock().unwrap();
            Ok(responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| ChatMessage::assistant("script exhausted")))
        }
    }

    async fn weather_registry() -> (Arc<McpToolRegistry>, Arc<AtomicUsize>) {
        let executions = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(McpToolRegistry::new());
        let counter = Arc::clone(&executions);
        registry
            .register(Arc::new(InProcessTool::new(
                "get_weather",
                "Look up current weather",
                serde_json::json!({
                    "type": "object",
                    "properties": { "location": { "type": "string" } },
                    "required": ["location"]
                }),
                move |args| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        match args["location"].as_str() {
                            Some("Tokyo") => Ok("28°C, Clear".to_string()),
                            Some("Paris") => Ok("20°C, Cloudy".to_string()),
                            _ => Ok("24°C, Partly Cloudy".to_string()),
                        }
                    })
                },
            )))
            .await;
        (registry, executions)
    }

    /// One tool round, then a terminal reply.
    #[tokio::test]
    async fn test_single_tool_happy_path() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![
            ChatMessage::assistant_with_tools(vec![ToolCall::new(
                "c1",
                "get_weather",
                r#"{"location":"Hangzhou"}"#,
            )]),
            ChatMessage::assistant("The weather in Hangzhou is 24°C, Partly Cloudy"),
        ]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "You are a helpful assistant.",
            DecodingConfig::default(),
        );

        let reply = agent
            .send_message("What's the weather in Hangzhou?", None)
            .await
            .unwrap();
        assert_eq!(
            reply.content.as_deref(),
            Some("The weather in Hangzhou is 24°C, Partly Cloudy")
        );

        let roles: Vec<&str> = agent.transcript().iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "assistant"]);

        let tool_msg = &agent.transcript()[3];
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_msg.content.as_deref(), Some("24°C, Partly Cloudy"));
    }

    /// Two tool calls in one assistant turn are answered in call order.
    #[tokio::test]
    async fn test_parallel_tool_calls_answered_in_order() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![
            ChatMessage::assistant_with_tools(vec![
                ToolCall::new("c1", "get_weather", r#"{"location":"Tokyo"}"#),
                ToolCall::new("c2", "get_weather", r#"{"location":"Paris"}"#),
            ]),
            ChatMessage::assistant("Tokyo: 28°C, Clear. Paris: 20°C, Cloudy."),
        ]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );
        agent.send_message("Tokyo and Paris?", None).await.unwrap();

        let tool_messages: Vec<(&str, &str)> = agent
            .transcript()
            .iter()
            .filter(|m| m.role == "tool")
            .map(|m| {
                (
                    m.tool_call_id.as_deref().unwrap(),
                    m.content.as_deref().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            tool_messages,
            vec![("c1", "28°C, Clear"), ("c2", "20°C, Cloudy")]
        );
        // Both precede the final assistant message.
        assert_eq!(agent.transcript().last().unwrap().role, "assistant");
    }

    /// A hallucinated tool name is rejected before any dispatch happens.
    #[tokio::test]
    async fn test_access_denied_before_any_execution() {
        let (registry, executions) = weather_registry().await;
        registry
            .register(Arc::new(InProcessTool::new(
                "mock_tool",
                "mock",
                serde_json::json!({ "type": "object" }),
                |_args| Box::pin(async { Ok("mock".to_string()) }),
            )))
            .await;

        let chat = ScriptedChat::new(vec![ChatMessage::assistant_with_tools(vec![
            ToolCall::new("c1", "mock_tool", "{}"),
        ])]);

        let mut agent = Agent::with_allowed_tools(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
            ["get_weather".to_string()].into_iter().collect(),
        )
        .await
        .unwrap();

        let result = agent.send_message("try", None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Access denied"));
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    /// The loop stops at exactly MAX_ROUNDS
    /// chat requests and repairs the transcript before failing.
    #[tokio::test]
    async fn test_runaway_loop_bounded_and_balanced() {
        let (registry, _executions) = weather_registry().await;
        // Every round requests another tool call; the script never ends.
        let fixed_point: Vec<ChatMessage> = (0..MAX_ROUNDS + 5)
            .map(|i| {
                ChatMessage::assistant_with_tools(vec![ToolCall::new(
                    format!("c{i}"),
                    "get_weather",
                    r#"{"location":"Hangzhou"}"#,
                )])
            })
            .collect();
        let chat = ScriptedChat::new(fixed_point);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );

        let result = agent.send_message("loop forever", None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Runaway loop"));

        assert_eq!(chat.call_count(), MAX_ROUNDS, "no more than 40 chat requests");

        // The aborted prefix was cleaned up: every call id has a reply.
        let transcript = Transcript::from_messages_for_tests(agent.transcript().to_vec());
        assert!(transcript.is_balanced());
        assert_eq!(agent.transcript().last().unwrap().role, "assistant");
    }

    #[tokio::test]
    async fn test_allowed_tools_must_exist_at_construction() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![]);

        let result = Agent::with_allowed_tools(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
            ["nonexistent_tool".to_string()].into_iter().collect(),
        )
        .await;
        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("Invalid argument"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_not_raised() {
        let registry = Arc::new(McpToolRegistry::new());
        registry
            .register(Arc::new(InProcessTool::new(
                "flaky",
                "always fails",
                serde_json::json!({ "type": "object" }),
                |_args| {
                    Box::pin(async {
                        Err(anyhow::anyhow!(McpilotError::McpToolFailure(
                            "backend unavailable".to_string()
                        )))
                    })
                },
            )))
            .await;

        let chat = ScriptedChat::new(vec![
            ChatMessage::assistant_with_tools(vec![ToolCall::new("c1", "flaky", "{}")]),
            ChatMessage::assistant("I could not fetch that."),
        ]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );
        let reply = agent.send_message("go", None).await.unwrap();
        assert_eq!(reply.content.as_deref(), Some("I could not fetch that."));

        let tool_msg = agent
            .transcript()
            .iter()
            .find(|m| m.role == "tool")
            .unwrap();
        let content = tool_msg.content.as_deref().unwrap();
        assert!(content.starts_with("Tool execution failed:"), "got: {content}");
        assert!(content.contains("backend unavailable"));
    }

    /// A call naming an unregistered tool is a registry miss, which is also
    /// converted into a tool message rather than raised.
    #[tokio::test]
    async fn test_no_executor_is_fed_back() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![
            ChatMessage::assistant_with_tools(vec![ToolCall::new("c1", "missing", "{}")]),
            ChatMessage::assistant("fine"),
        ]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );
        agent.send_message("go", None).await.unwrap();

        let tool_msg = agent
            .transcript()
            .iter()
            .find(|m| m.role == "tool")
            .unwrap();
        assert!(tool_msg
            .content
            .as_deref()
            .unwrap()
            .contains("No executor for tool"));
    }

    /// Repeated sends never accumulate system messages.
    #[tokio::test]
    async fn test_repeated_sends_keep_one_system_message() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![
            ChatMessage::assistant("one"),
            ChatMessage::assistant("two"),
            ChatMessage::assistant("three"),
        ]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );
        for text in ["a", "b", "c"] {
            agent.send_message(text, None).await.unwrap();
        }

        let system_count = agent
            .transcript()
            .iter()
            .filter(|m| m.role == "system")
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(agent.transcript()[0].role, "system");
    }

    #[tokio::test]
    async fn test_clear_conversation_keeps_anchor() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![ChatMessage::assistant("hi")]);

        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );
        agent.send_message("hello", None).await.unwrap();
        agent.clear_conversation();

        assert_eq!(agent.transcript().len(), 1);
        assert_eq!(agent.transcript()[0].role, "system");
    }

    #[tokio::test]
    async fn test_decoding_parameter_passthrough() {
        let (registry, _executions) = weather_registry().await;
        let chat = ScriptedChat::new(vec![]);
        let mut agent = Agent::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            registry,
            "sys",
            DecodingConfig::default(),
        );

        agent.set_temperature(0.3);
        agent.set_top_p(0.9);
        agent.set_max_tokens(512);
        agent.set_frequency_penalty(0.5);
        agent.set_presence_penalty(-0.5);

        assert_eq!(agent.temperature(), 0.3);
        assert_eq!(agent.top_p(), 0.9);
        assert_eq!(agent.max_tokens(), 512);
        assert_eq!(agent.frequency_penalty(), 0.5);
        assert_eq!(agent.presence_penalty(), -0.5);
        assert_eq!(agent.decoding().max_tokens, 512);
    }

    impl Transcript {
        /// Rebuild a transcript from raw messages for balance assertions.
        fn from_messages_for_tests(messages: Vec<ChatMessage>) -> Self {
            let mut transcript = Transcript::new();
            for message in messages {
                transcript.push(message);
            }
            transcript
        }
    }
}

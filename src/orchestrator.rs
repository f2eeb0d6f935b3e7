use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Options;
use crate::error::ChatError;
use crate::tools::{ToolRegistry, ToolSpec};
use crate::transport::ChatTransport;
use crate::types::{ChatRequest, Message, ToolCallRequest};

/// Where an orchestration run is. Recorded in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Sent,
    ToolsRequested,
    ToolResultsAppended,
    FollowupSent,
    Done,
}

/// Runs one LLM augmentation of a piece of text, resolving at most one
/// batch of tool calls.
///
/// Tool calls are answered in the order the model listed them. A call whose
/// execution fails is dropped: neither its assistant message nor a tool
/// result is appended, and the model is not told about the failure.
pub struct Orchestrator {
    transport: Arc<dyn ChatTransport>,
    registry: Arc<ToolRegistry>,
    options: Options,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn ChatTransport>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            transport,
            registry,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Resolve `original` through the model, or give it back unchanged if
    /// either remote call fails or returns no choices.
    pub async fn run(&self, original: String, system: Option<&str>, tools: &[ToolSpec]) -> String {
        match self.resolve(&original, system, tools).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "LLM augmentation failed, returning original text");
                original
            }
        }
    }

    /// Like [`run`](Self::run) but surfaces the failure instead of falling back.
    pub async fn resolve(
        &self,
        original: &str,
        system: Option<&str>,
        tools: &[ToolSpec],
    ) -> Result<String, ChatError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(original));
        debug!(phase = ?Phase::Init, messages = messages.len(), tools = tools.len());

        let request = ChatRequest::new(messages.clone()).with_tools(tools.to_vec());
        let reply = self.transport.send(request, &self.options).await?;
        debug!(phase = ?Phase::Sent, choices = reply.choices.len());

        let top = reply.top()?;
        let calls = top.tool_calls();
        if calls.is_empty() {
            debug!(phase = ?Phase::Done, "no tool calls");
            return Ok(top.text().to_string());
        }

        info!(phase = ?Phase::ToolsRequested, count = calls.len(), "model requested tools");
        let answered = self.answer_tool_calls(calls, &mut messages).await;
        debug!(phase = ?Phase::ToolResultsAppended, answered, requested = calls.len());

        // Tools are resolved in exactly one round: the follow-up carries none.
        let followup = self
            .transport
            .send(ChatRequest::new(messages), &self.options)
            .await?;
        debug!(phase = ?Phase::FollowupSent, choices = followup.choices.len());

        let top = followup.top()?;
        if !top.tool_calls().is_empty() {
            debug!(
                count = top.tool_calls().len(),
                "follow-up requested more tools, ignoring"
            );
        }
        debug!(phase = ?Phase::Done);
        Ok(top.text().to_string())
    }

    /// Execute each call and append its assistant/tool message pair.
    /// Returns how many calls were answered.
    async fn answer_tool_calls(
        &self,
        calls: &[ToolCallRequest],
        messages: &mut Vec<Message>,
    ) -> usize {
        let mut answered = 0;
        for call in calls {
            match self.registry.execute(call.name(), call.arguments()).await {
                Ok(result) => {
                    debug!(tool = call.name(), id = %call.id, "tool call answered");
                    messages.push(Message::tool_call(call.clone()));
                    messages.push(Message::tool_result(call.id.clone(), result));
                    answered += 1;
                }
                Err(e) => {
                    warn!(
                        tool = call.name(),
                        id = %call.id,
                        error = %e,
                        "tool call failed, omitting it"
                    );
                }
            }
        }
        answered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tools::ToolDefinition;
    use crate::transport::ChatStream;
    use crate::types::{ChatReply, Choice, Role};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use tokio::sync::Mutex;

    // --- Mock Transport ---

    pub(crate) struct MockTransport {
        replies: Mutex<VecDeque<Result<ChatReply, ChatError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        stream_lines: Vec<String>,
    }

    impl MockTransport {
        pub(crate) fn new(replies: Vec<Result<ChatReply, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                stream_lines: Vec::new(),
            })
        }

        pub(crate) fn streaming(lines: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                stream_lines: lines.iter().map(|l| l.to_string()).collect(),
            })
        }

        pub(crate) async fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        async fn send(
            &self,
            request: ChatRequest,
            _options: &Options,
        ) -> Result<ChatReply, ChatError> {
            self.requests.lock().await.push(request);
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(ChatError::Transport("no more mock replies".into())))
        }

        fn stream(&self, messages: Vec<Message>, _options: &Options) -> ChatStream {
            let (tx, stream) = ChatStream::channel();
            let lines = self.stream_lines.clone();
            let request = ChatRequest::new(messages).streaming();
            if let Ok(mut requests) = self.requests.try_lock() {
                requests.push(request);
            }
            tokio::spawn(async move {
                for line in lines {
                    if !tx.chunk(line).await {
                        break;
                    }
                }
            });
            stream
        }
    }

    // --- Helpers ---

    pub(crate) fn text_reply(text: &str) -> Result<ChatReply, ChatError> {
        Ok(ChatReply {
            choices: vec![Choice {
                message: Some(Message::assistant(text)),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    fn tool_reply(calls: Vec<ToolCallRequest>) -> Result<ChatReply, ChatError> {
        Ok(ChatReply {
            choices: vec![Choice {
                message: Some(Message {
                    tool_calls: calls,
                    ..Message::assistant("")
                }),
                finish_reason: Some("tool_calls".into()),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    pub(crate) fn empty_reply() -> Result<ChatReply, ChatError> {
        Ok(ChatReply::default())
    }

    fn registry() -> (Arc<ToolRegistry>, Vec<ToolSpec>) {
        let mut reg = ToolRegistry::new();
        let say_hi = reg.register(
            ToolDefinition::new("sayHi", "Say hi to the user").param("name", "First name"),
            |name: String| format!("Hello there {name}"),
        );
        let weather = reg.register(
            ToolDefinition::new("getWeather", "Weather at coordinates")
                .param("lat", "Latitude")
                .param("lon", "Longitude"),
            |lat: f64, lon: f64| format!("Clear sky at ({lat}, {lon})"),
        );
        (Arc::new(reg), vec![say_hi, weather])
    }

    fn orchestrator(transport: Arc<MockTransport>) -> (Orchestrator, Vec<ToolSpec>) {
        let (reg, specs) = registry();
        (Orchestrator::new(transport, reg), specs)
    }

    // --- Tests ---

    #[tokio::test]
    async fn plain_reply_is_returned() {
        let transport = MockTransport::new(vec![text_reply("Hi!")]);
        let (orch, tools) = orchestrator(transport.clone());

        let out = orch.run("Say hi".into(), Some("Be brief."), &tools).await;
        assert_eq!(out, "Hi!");

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 1);
        let first = &requests[0];
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].role, Role::System);
        assert_eq!(first.messages[0].content, "Be brief.");
        assert_eq!(first.messages[1].role, Role::User);
        assert_eq!(first.messages[1].content, "Say hi");
        assert_eq!(first.tools.len(), 2);
        assert_eq!(first.tool_choice.as_deref(), Some("auto"));
    }

    #[tokio::test]
    async fn no_system_message_and_no_tools() {
        let transport = MockTransport::new(vec![text_reply("ok")]);
        let (orch, _) = orchestrator(transport.clone());

        assert_eq!(orch.run("ping".into(), None, &[]).await, "ok");
        let requests = transport.requests().await;
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, Role::User);
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].tool_choice.is_none());
    }

    #[tokio::test]
    async fn empty_initial_reply_returns_original() {
        let transport = MockTransport::new(vec![empty_reply()]);
        let (orch, tools) = orchestrator(transport.clone());

        let out = orch.run("untouched text".into(), None, &tools).await;
        assert_eq!(out, "untouched text");
        assert!(matches!(
            orch.resolve("x", None, &tools).await,
            Err(ChatError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn transport_error_returns_original() {
        let transport = MockTransport::new(vec![Err(ChatError::RemoteStatus {
            status: 429,
            body: "rate limited".into(),
        })]);
        let (orch, tools) = orchestrator(transport);
        assert_eq!(orch.run("keep me".into(), None, &tools).await, "keep me");
    }

    #[tokio::test]
    async fn say_hi_round_trip() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![ToolCallRequest::new(
                "call_1",
                "sayHi",
                r#"{"name":"John"}"#,
            )]),
            text_reply("Hello there John"),
        ]);
        let (orch, tools) = orchestrator(transport.clone());

        let out = orch.run("Say hi to John".into(), None, &tools).await;
        assert_eq!(out, "Hello there John");

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 2);

        let followup = &requests[1];
        assert!(followup.tools.is_empty());
        assert!(followup.tool_choice.is_none());
        assert_eq!(followup.messages.len(), 3);
        assert_eq!(followup.messages[1].role, Role::Assistant);
        assert_eq!(followup.messages[1].tool_calls[0].id, "call_1");
        assert_eq!(followup.messages[2].role, Role::Tool);
        assert_eq!(followup.messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(followup.messages[2].content, "Hello there John");
    }

    #[tokio::test]
    async fn failed_tool_call_is_omitted() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![
                ToolCallRequest::new("bad", "missingTool", "{}"),
                ToolCallRequest::new("bad_args", "sayHi", r#"{"name": 3}"#),
                ToolCallRequest::new("good", "getWeather", r#"{"lat":37.7749,"lon":-122.4194}"#),
            ]),
            text_reply("It is clear."),
        ]);
        let (orch, tools) = orchestrator(transport.clone());

        assert_eq!(orch.run("Weather?".into(), None, &tools).await, "It is clear.");

        let followup = &transport.requests().await[1];
        assert_eq!(followup.messages.len(), 3);
        assert_eq!(followup.messages[1].tool_calls[0].id, "good");
        assert_eq!(followup.messages[2].tool_call_id.as_deref(), Some("good"));
        assert!(followup.messages[2].content.starts_with("Clear sky"));
    }

    #[tokio::test]
    async fn tool_calls_answered_in_order_once_each() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![
                ToolCallRequest::new("a", "sayHi", r#"{"name":"Ann"}"#),
                ToolCallRequest::new("b", "sayHi", r#"{"name":"Bob"}"#),
            ]),
            text_reply("Greeted both."),
        ]);
        let (orch, tools) = orchestrator(transport.clone());
        assert_eq!(orch.run("Greet".into(), None, &tools).await, "Greeted both.");

        let followup = &transport.requests().await[1];
        let roles: Vec<Role> = followup.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
        );

        let mut requested: HashMap<&str, usize> = HashMap::new();
        let mut answered: HashMap<&str, usize> = HashMap::new();
        for m in &followup.messages {
            for call in &m.tool_calls {
                *requested.entry(call.id.as_str()).or_default() += 1;
            }
            if let Some(id) = m.tool_call_id.as_deref() {
                *answered.entry(id).or_default() += 1;
            }
        }
        assert_eq!(requested, answered);
        assert!(requested.values().all(|&n| n == 1));
        assert_eq!(followup.messages[2].content, "Hello there Ann");
        assert_eq!(followup.messages[4].content, "Hello there Bob");
    }

    #[tokio::test]
    async fn followup_failure_returns_original() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![ToolCallRequest::new("c1", "sayHi", r#"{"name":"Jo"}"#)]),
            Err(ChatError::Decode("bad body".into())),
        ]);
        let (orch, tools) = orchestrator(transport);
        assert_eq!(orch.run("original".into(), None, &tools).await, "original");
    }

    #[tokio::test]
    async fn empty_followup_returns_original() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![ToolCallRequest::new("c1", "sayHi", r#"{"name":"Jo"}"#)]),
            empty_reply(),
        ]);
        let (orch, tools) = orchestrator(transport.clone());
        assert_eq!(orch.run("original".into(), None, &tools).await, "original");
        assert_eq!(transport.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn second_round_of_tool_calls_is_not_followed() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![ToolCallRequest::new("c1", "sayHi", r#"{"name":"Jo"}"#)]),
            tool_reply(vec![ToolCallRequest::new("c2", "sayHi", r#"{"name":"Al"}"#)]),
            text_reply("never requested"),
        ]);
        let (orch, tools) = orchestrator(transport.clone());

        let out = orch.resolve("hi", None, &tools).await.unwrap();
        assert_eq!(out, "");
        assert_eq!(transport.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn all_tools_failing_still_sends_followup() {
        let transport = MockTransport::new(vec![
            tool_reply(vec![ToolCallRequest::new("c1", "nope", "{}")]),
            text_reply("I couldn't use that tool."),
        ]);
        let (orch, tools) = orchestrator(transport.clone());
        assert_eq!(
            orch.run("go".into(), None, &tools).await,
            "I couldn't use that tool."
        );
        let followup = &transport.requests().await[1];
        assert_eq!(followup.messages.len(), 1);
    }
}

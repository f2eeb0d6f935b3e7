use std::sync::Arc;

use tracing::warn;

use crate::config::Options;
use crate::error::PassThrough;
use crate::transport::{ChatStream, ChatTransport};
use crate::types::{ChatRequest, Message};

/// A text function whose output is forwarded to the model as a single user
/// message. No system prompt, no tools.
pub struct Chained<F> {
    base: F,
    transport: Arc<dyn ChatTransport>,
    options: Options,
}

impl<F> Chained<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(base: F, transport: Arc<dyn ChatTransport>, options: Options) -> Self {
        Self {
            base,
            transport,
            options,
        }
    }

    /// The model's reply. On failure the error carries the base output.
    pub async fn call(&self, input: &str) -> Result<String, PassThrough> {
        let original = (self.base)(input);
        let request = ChatRequest::new(vec![Message::user(original.as_str())]);
        let outcome = match self.transport.send(request, &self.options).await {
            Ok(reply) => reply.top().map(|choice| choice.text().to_string()),
            Err(e) => Err(e),
        };
        outcome.map_err(|source| {
            warn!(error = %source, "chain-through call failed");
            PassThrough { original, source }
        })
    }

    /// Same as [`call`](Self::call) but the reply arrives line by line.
    pub fn stream(&self, input: &str) -> ChatStream {
        let original = (self.base)(input);
        self.transport
            .stream(vec![Message::user(original)], &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::orchestrator::tests::{empty_reply, text_reply, MockTransport};
    use crate::types::Role;

    fn greet(name: &str) -> String {
        format!("Write a haiku about {name}")
    }

    #[tokio::test]
    async fn sends_single_user_message() {
        let transport = MockTransport::new(vec![text_reply("a haiku")]);
        let chained = Chained::new(greet, transport.clone(), Options::default());

        assert_eq!(chained.call("rust").await.unwrap(), "a haiku");
        let requests = transport.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, Role::User);
        assert_eq!(requests[0].messages[0].content, "Write a haiku about rust");
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].tool_choice.is_none());
    }

    #[tokio::test]
    async fn failure_carries_original_text() {
        let transport = MockTransport::new(vec![
            Err(ChatError::RemoteStatus {
                status: 500,
                body: "oops".into(),
            }),
            empty_reply(),
        ]);
        let chained = Chained::new(greet, transport, Options::default());

        let err = chained.call("cats").await.unwrap_err();
        assert_eq!(err.original, "Write a haiku about cats");
        assert!(matches!(err.source, ChatError::RemoteStatus { status: 500, .. }));

        let err = chained.call("dogs").await.unwrap_err();
        assert_eq!(err.original, "Write a haiku about dogs");
        assert!(matches!(err.source, ChatError::EmptyReply));
    }

    #[tokio::test]
    async fn stream_forwards_lines() {
        let transport = MockTransport::streaming(&["data: a", "", "data: b"]);
        let chained = Chained::new(greet, transport, Options::default());
        let lines = chained.stream("owls").collect().await.unwrap();
        assert_eq!(lines, vec!["data: a", "", "data: b"]);
    }
}

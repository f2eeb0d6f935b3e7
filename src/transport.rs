use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::config::{Options, ProviderConfig};
use crate::error::{ChatError, ConfigError};
use crate::types::{parse_sse_line, ChatReply, ChatRequest, Message};

const STREAM_BUFFER: usize = 64;

/// Stateless chat-completion call. Request in, reply out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One blocking round trip. No retries.
    async fn send(&self, request: ChatRequest, options: &Options) -> Result<ChatReply, ChatError>;

    /// Open a streaming request and return immediately. Lines of the body
    /// arrive on `chunks` while it is still being received.
    fn stream(&self, messages: Vec<Message>, options: &Options) -> ChatStream;
}

/// Receiving half of a streamed reply.
///
/// `chunks` yields one item per body line, terminator stripped. At most one
/// error arrives on `errors`, after which the stream ends. Both channels
/// close when the producer finishes; drain both.
pub struct ChatStream {
    pub chunks: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<ChatError>,
}

/// Producing half of a [`ChatStream`]. Dropping it closes both channels.
pub struct StreamSender {
    chunks: mpsc::Sender<String>,
    errors: mpsc::Sender<ChatError>,
}

impl StreamSender {
    /// Returns false once the consumer has gone away.
    pub async fn chunk(&self, line: String) -> bool {
        self.chunks.send(line).await.is_ok()
    }

    /// Report a terminal error and close the stream.
    pub async fn fail(self, error: ChatError) {
        warn!(error = %error, "chat stream failed");
        let _ = self.errors.send(error).await;
    }
}

impl ChatStream {
    pub fn channel() -> (StreamSender, ChatStream) {
        let (chunk_tx, chunk_rx) = mpsc::channel(STREAM_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(1);
        (
            StreamSender {
                chunks: chunk_tx,
                errors: error_tx,
            },
            ChatStream {
                chunks: chunk_rx,
                errors: error_rx,
            },
        )
    }

    /// Drain every line, then surface the error if one was sent.
    pub async fn collect(mut self) -> Result<Vec<String>, ChatError> {
        let mut lines = Vec::new();
        while let Some(line) = self.chunks.recv().await {
            lines.push(line);
        }
        match self.errors.recv().await {
            Some(error) => Err(error),
            None => Ok(lines),
        }
    }

    /// Drain the stream and join the delta text of its SSE data lines.
    pub async fn text(self) -> Result<String, ChatError> {
        let lines = self.collect().await?;
        Ok(lines.iter().filter_map(|l| parse_sse_line(l)).collect())
    }
}

/// [`ChatTransport`] over any OpenAI-compatible HTTP endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpTransport {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Build from the process-wide config installed with [`crate::config::set_global`].
    pub fn from_global() -> Result<Self, ConfigError> {
        Ok(Self::new(crate::config::global()?.clone()))
    }

    /// Use a preconfigured client, e.g. one with a timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn prepare(&self, mut request: ChatRequest) -> ChatRequest {
        if request.model.is_none() {
            request.model = Some(self.config.model.clone());
        }
        request
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: ChatRequest, options: &Options) -> Result<ChatReply, ChatError> {
        let request = self.prepare(request);

        debug!(
            model = request.model.as_deref().unwrap_or_default(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat request"
        );
        if options.diagnostics {
            match serde_json::to_string_pretty(&request) {
                Ok(body) => info!("raw request: {body}"),
                Err(e) => warn!(error = %e, "could not format request"),
            }
        }

        let resp = post(&self.client, &self.config, &request).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let text = text.trim();

        if options.diagnostics {
            info!("raw response: {}", pretty_body(text));
        }

        let reply: ChatReply =
            serde_json::from_str(text).map_err(|e| ChatError::Decode(e.to_string()))?;

        if let Some(ref usage) = reply.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                choices = reply.choices.len(),
                "chat reply"
            );
        }

        Ok(reply)
    }

    fn stream(&self, messages: Vec<Message>, options: &Options) -> ChatStream {
        let request = self.prepare(ChatRequest::new(messages).streaming());
        if options.diagnostics {
            if let Ok(body) = serde_json::to_string_pretty(&request) {
                info!("raw stream request: {body}");
            }
        }

        let (tx, stream) = ChatStream::channel();
        let client = self.client.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let resp = match post(&client, &config, &request).await {
                Ok(resp) => resp,
                Err(e) => return tx.fail(e).await,
            };
            let body = resp.bytes_stream().map_err(std::io::Error::other);
            pump_lines(StreamReader::new(Box::pin(body)), tx).await;
        });

        stream
    }
}

/// POST a request and reject non-success statuses.
async fn post(
    client: &reqwest::Client,
    config: &ProviderConfig,
    request: &ChatRequest,
) -> Result<reqwest::Response, ChatError> {
    let resp = client
        .post(config.endpoint())
        .bearer_auth(&config.api_key)
        .header("content-type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|e| ChatError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ChatError::RemoteStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Forward each line of `reader` until EOF, a read error, or the consumer leaves.
async fn pump_lines<R>(reader: R, tx: StreamSender)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !tx.chunk(line).await {
                    debug!("stream consumer dropped, stopping");
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                return tx
                    .fail(ChatError::Transport(format!(
                        "error reading streamed response: {e}"
                    )))
                    .await
            }
        }
    }
}

fn pretty_body(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_string())
}

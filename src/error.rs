/// Failure of a remote chat-completion call.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("API returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },
    #[error("failed to decode reply: {0}")]
    Decode(String),
    #[error("reply contained no choices")]
    EmptyReply,
}

/// Failure to execute a registered tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("error parsing arguments: {0}")]
    ArgumentParse(String),
    #[error("cannot convert parameter {param} to {expected}")]
    ArgumentConversion { param: String, expected: String },
    #[error("invalid tool signature: {0}")]
    InvalidSignature(String),
    #[error("tool failed: {0}")]
    Execution(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("global provider config is already set")]
    AlreadyInitialized,
    #[error("global provider config has not been set")]
    NotInitialized,
}

/// A chain-through call that could not reach the model. Carries the
/// undecorated output so callers can degrade to it.
#[derive(Debug, thiserror::Error)]
#[error("chain-through call failed: {source}")]
pub struct PassThrough {
    pub original: String,
    #[source]
    pub source: ChatError,
}

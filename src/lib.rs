pub mod config;
pub mod decorator;
pub mod error;
pub mod orchestrator;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{Options, ProviderConfig};
pub use decorator::{augment, chain, Augmented, Chained, DecoratorConfig};
pub use error::{ChatError, ConfigError, PassThrough, ToolError};
pub use orchestrator::{Orchestrator, Phase};
pub use tools::{ToolDefinition, ToolHandler, ToolRegistry, ToolSpec};
pub use transport::{ChatStream, ChatTransport, HttpTransport, StreamSender};
pub use types::{ChatReply, ChatRequest, Message, Role, ToolCallRequest};

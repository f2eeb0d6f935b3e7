pub mod augment;
pub mod chain;

use std::sync::Arc;

pub use augment::Augmented;
pub use chain::Chained;

use crate::config::Options;
use crate::tools::{ToolRegistry, ToolSpec};
use crate::transport::ChatTransport;

/// Named options accepted by both decorator forms. Chain-through ignores
/// `system` and `tools`.
#[derive(Debug, Clone, Default)]
pub struct DecoratorConfig {
    /// Prepended as a system message when non-empty.
    pub system: Option<String>,
    pub options: Options,
    /// Offered to the model in this order.
    pub tools: Vec<ToolSpec>,
}

impl DecoratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_diagnostics(mut self) -> Self {
        self.options.diagnostics = true;
        self
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }
}

/// Wrap `base` so its output is post-processed by the model, with tools.
pub fn augment<F>(
    base: F,
    transport: Arc<dyn ChatTransport>,
    registry: Arc<ToolRegistry>,
    config: DecoratorConfig,
) -> Augmented<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    Augmented::new(base, transport, registry, config)
}

/// Wrap `base` so its output is sent to the model as a bare user message.
pub fn chain<F>(base: F, transport: Arc<dyn ChatTransport>, options: Options) -> Chained<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    Chained::new(base, transport, options)
}

use std::sync::Arc;

use super::DecoratorConfig;
use crate::orchestrator::Orchestrator;
use crate::tools::ToolRegistry;
use crate::transport::ChatTransport;

/// A text function whose output is rewritten by the model before it is
/// returned. Never fails: on any remote error the base output comes back as-is.
pub struct Augmented<F> {
    base: F,
    orchestrator: Orchestrator,
    config: DecoratorConfig,
}

impl<F> Augmented<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(
        base: F,
        transport: Arc<dyn ChatTransport>,
        registry: Arc<ToolRegistry>,
        config: DecoratorConfig,
    ) -> Self {
        let orchestrator = Orchestrator::new(transport, registry).with_options(config.options);
        Self {
            base,
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &DecoratorConfig {
        &self.config
    }

    pub async fn call(&self, input: &str) -> String {
        let original = (self.base)(input);
        self.orchestrator
            .run(original, self.config.system.as_deref(), &self.config.tools)
            .await
    }
}

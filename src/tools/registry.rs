use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::handler::{FnTool, ToolFn, ToolHandler};
use super::schema::{ToolDefinition, ToolSpec};
use crate::error::ToolError;

struct Registration {
    spec: ToolSpec,
    handler: Box<dyn ToolHandler>,
}

/// Catalog of executable tools keyed by name.
///
/// Registration needs `&mut self`, so it can't race with lookups. Build the
/// registry during startup, then share it behind an `Arc` for execution.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Registration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host function. Parameter types come from its signature,
    /// names from `definition`. Replaces any tool with the same name.
    pub fn register<F, Args>(&mut self, definition: ToolDefinition, func: F) -> ToolSpec
    where
        F: ToolFn<Args>,
        Args: 'static,
    {
        let spec = definition.infer(&F::shapes());
        let handler = FnTool::new(func, spec.param_names());
        self.insert(spec, Box::new(handler))
    }

    /// Register a host function whose parameters will be named `param0`, `param1`, ...
    pub fn register_fn<F, Args>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> ToolSpec
    where
        F: ToolFn<Args>,
        Args: 'static,
    {
        self.register(ToolDefinition::new(name, description), func)
    }

    /// Register a hand-written handler under an explicit spec.
    pub fn register_handler(
        &mut self,
        spec: ToolSpec,
        handler: impl ToolHandler + 'static,
    ) -> ToolSpec {
        self.insert(spec, Box::new(handler))
    }

    fn insert(&mut self, spec: ToolSpec, handler: Box<dyn ToolHandler>) -> ToolSpec {
        debug!(tool = spec.name(), params = spec.params().len(), "registering tool");
        let name = spec.name().to_string();
        let registration = Registration {
            spec: spec.clone(),
            handler,
        };
        if self.tools.insert(name, registration).is_some() {
            debug!(tool = spec.name(), "replaced earlier registration");
        }
        spec
    }

    /// Run a tool with the model's JSON-encoded arguments.
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let args = parse_arguments(arguments)?;
        tool.handler.call(&args).await
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    /// All specs, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec.clone()).collect();
        specs.sort_by(|a, b| a.name().cmp(b.name()));
        specs
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

/// Decode an argument payload into an object. Blank input means no arguments.
fn parse_arguments(arguments: &str) -> Result<Map<String, Value>, ToolError> {
    if arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::ArgumentParse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(ToolError::ArgumentParse(e.to_string())),
    }
}

pub mod handler;
pub mod registry;
pub mod schema;

pub use handler::{ToolArg, ToolFn, ToolHandler, ToolOutput};
pub use registry::ToolRegistry;
pub use schema::{ParamShape, ParamSpec, ParamType, ToolDefinition, ToolSpec};

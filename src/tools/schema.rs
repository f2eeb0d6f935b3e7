use std::collections::HashSet;
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::debug;

use super::handler::ToolArg;

/// Primitive JSON type a tool parameter is advertised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type information recovered from one parameter of a host function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamShape {
    pub kind: ParamType,
    pub required: bool,
}

impl ParamShape {
    pub fn of<T: ToolArg>() -> Self {
        Self {
            kind: T::KIND,
            required: T::REQUIRED,
        }
    }
}

/// One advertised parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamType,
    pub required: bool,
}

/// Schema of a tool as sent to the model. Immutable once built.
///
/// Serializes to the OpenAI function-tool shape with properties in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Build a spec from explicit parameters. Used for hand-written handlers;
    /// function tools get theirs from [`ToolDefinition`].
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn required(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }
}

impl Serialize for ToolSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Function<'a> {
            name: &'a str,
            description: &'a str,
            parameters: Parameters<'a>,
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry(
            "function",
            &Function {
                name: &self.name,
                description: &self.description,
                parameters: Parameters(&self.params),
            },
        )?;
        map.end()
    }
}

struct Parameters<'a>(&'a [ParamSpec]);

impl Serialize for Parameters<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let required: Vec<&str> = self
            .0
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(self.0))?;
        map.serialize_entry("required", &required)?;
        map.end()
    }
}

struct Properties<'a>(&'a [ParamSpec]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Field<'a> {
            description: &'a str,
            #[serde(rename = "type")]
            kind: ParamType,
        }

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for p in self.0 {
            map.serialize_entry(
                &p.name,
                &Field {
                    description: &p.description,
                    kind: p.kind,
                },
            )?;
        }
        map.end()
    }
}

/// Caller-facing description of a function tool: its name, what it does,
/// and optionally the names of its parameters in declaration order.
///
/// Parameter types are never written here. They come from the function's
/// signature when the tool is registered.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    params: Vec<(String, Option<String>)>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Name and describe the next positional parameter.
    pub fn param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.push((name.into(), Some(description.into())));
        self
    }

    /// Name the next positional parameter with a generated description.
    pub fn param_named(mut self, name: impl Into<String>) -> Self {
        self.params.push((name.into(), None));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Combine the supplied names with the shapes taken from a signature.
    ///
    /// Never fails. If the supplied names don't line up with the signature,
    /// or any of them is empty or repeated, all of them are dropped in
    /// favour of `param0`, `param1`, ...
    fn names_are_distinct(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.params.len());
        self.params
            .iter()
            .all(|(name, _)| !name.trim().is_empty() && seen.insert(name.as_str()))
    }

    pub fn infer(self, shapes: &[ParamShape]) -> ToolSpec {
        let named = !self.params.is_empty()
            && self.params.len() == shapes.len()
            && self.names_are_distinct();
        if !named && !self.params.is_empty() {
            debug!(
                tool = %self.name,
                supplied = self.params.len(),
                arity = shapes.len(),
                "parameter names are unusable for this signature, using placeholders"
            );
        }

        let params = if named {
            self.params
                .into_iter()
                .zip(shapes)
                .map(|((name, description), shape)| ParamSpec {
                    description: description.unwrap_or_else(|| {
                        format!("The {name} parameter of type {}", shape.kind)
                    }),
                    name,
                    kind: shape.kind,
                    required: shape.required,
                })
                .collect()
        } else {
            shapes
                .iter()
                .enumerate()
                .map(|(i, shape)| ParamSpec {
                    name: format!("param{i}"),
                    description: format!("Parameter {} of type {}", i + 1, shape.kind),
                    kind: shape.kind,
                    required: shape.required,
                })
                .collect()
        };

        ToolSpec {
            name: self.name,
            description: self.description,
            params,
        }
    }
}

use std::fmt::Display;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::schema::{ParamShape, ParamType};
use crate::error::ToolError;

/// A tool's execution handler. Receives the decoded argument object.
///
/// Function tools get one generated for them; implement this directly for
/// tools that need to await I/O.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError>;
}

/// A value a tool parameter can be coerced into from model-supplied JSON.
pub trait ToolArg: Sized {
    const KIND: ParamType;
    const REQUIRED: bool = true;

    /// `None` means the value isn't convertible.
    fn from_value(value: &Value) -> Option<Self>;

    /// Value to use when the argument is absent or null.
    fn missing() -> Option<Self> {
        None
    }
}

impl ToolArg for String {
    const KIND: ParamType = ParamType::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl ToolArg for bool {
    const KIND: ParamType = ParamType::Boolean;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ToolArg for f64 {
    const KIND: ParamType = ParamType::Number;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl ToolArg for f32 {
    const KIND: ParamType = ParamType::Number;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|n| n as f32)
    }
}

// Integers accept any JSON number in range; fractions truncate toward zero.
// `MAX as f64` can round up to 2^bits, so the upper bound is exclusive.
macro_rules! int_arg {
    ($($t:ty),*) => {
        $(
            impl ToolArg for $t {
                const KIND: ParamType = ParamType::Number;

                fn from_value(value: &Value) -> Option<Self> {
                    if let Some(i) = value.as_i64() {
                        return <$t>::try_from(i).ok();
                    }
                    if let Some(u) = value.as_u64() {
                        return <$t>::try_from(u).ok();
                    }
                    let n = value.as_f64()?.trunc();
                    (n.is_finite() && n >= <$t>::MIN as f64 && n < <$t>::MAX as f64 + 1.0)
                        .then(|| n as $t)
                }
            }
        )*
    };
}

int_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Passed through untouched; advertised as a string.
impl ToolArg for Value {
    const KIND: ParamType = ParamType::String;

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: ToolArg> ToolArg for Option<T> {
    const KIND: ParamType = T::KIND;
    const REQUIRED: bool = false;

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Some)
    }

    fn missing() -> Option<Self> {
        Some(None)
    }
}

fn extract<T: ToolArg>(args: &Map<String, Value>, name: Option<&String>) -> Result<T, ToolError> {
    let name = name.ok_or_else(|| {
        ToolError::InvalidSignature("more parameters than schema entries".into())
    })?;
    let converted = match args.get(name) {
        None | Some(Value::Null) => T::missing(),
        Some(value) => T::from_value(value),
    };
    converted.ok_or_else(|| ToolError::ArgumentConversion {
        param: name.clone(),
        expected: T::KIND.to_string(),
    })
}

/// A tool function's return value, rendered as the single text result.
pub trait ToolOutput {
    fn into_text(self) -> Result<String, ToolError>;
}

impl ToolOutput for String {
    fn into_text(self) -> Result<String, ToolError> {
        Ok(self)
    }
}

impl ToolOutput for &str {
    fn into_text(self) -> Result<String, ToolError> {
        Ok(self.to_owned())
    }
}

macro_rules! display_output {
    ($($t:ty),*) => {
        $(
            impl ToolOutput for $t {
                fn into_text(self) -> Result<String, ToolError> {
                    Ok(self.to_string())
                }
            }
        )*
    };
}

display_output!(bool, char, f32, f64, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToolOutput for Value {
    fn into_text(self) -> Result<String, ToolError> {
        match self {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Err(ToolError::InvalidSignature("tool returned null".into())),
            other => Err(ToolError::InvalidSignature(format!(
                "tool must return a single text value, got {other}"
            ))),
        }
    }
}

impl<T: ToolOutput> ToolOutput for Option<T> {
    fn into_text(self) -> Result<String, ToolError> {
        match self {
            Some(value) => value.into_text(),
            None => Err(ToolError::InvalidSignature("tool returned no value".into())),
        }
    }
}

impl<T: ToolOutput, E: Display> ToolOutput for Result<T, E> {
    fn into_text(self) -> Result<String, ToolError> {
        match self {
            Ok(value) => value.into_text(),
            Err(e) => Err(ToolError::Execution(e.to_string())),
        }
    }
}

/// A host function usable as a tool. Implemented for every
/// `Fn(A1, .., An) -> R` with up to six [`ToolArg`] parameters.
pub trait ToolFn<Args>: Send + Sync + 'static {
    /// Parameter types in declaration order.
    fn shapes() -> Vec<ParamShape>;

    /// Call with arguments looked up by `names`, which must line up with
    /// the parameters.
    fn invoke(&self, names: &[String], args: &Map<String, Value>) -> Result<String, ToolError>;
}

macro_rules! impl_tool_fn {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> ToolFn<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: ToolOutput,
            $($arg: ToolArg,)*
        {
            fn shapes() -> Vec<ParamShape> {
                vec![$(ParamShape::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn invoke(
                &self,
                names: &[String],
                args: &Map<String, Value>,
            ) -> Result<String, ToolError> {
                let mut names = names.iter();
                $(let $arg = extract::<$arg>(args, names.next())?;)*
                (self)($($arg),*).into_text()
            }
        }
    };
}

impl_tool_fn!();
impl_tool_fn!(A1);
impl_tool_fn!(A1, A2);
impl_tool_fn!(A1, A2, A3);
impl_tool_fn!(A1, A2, A3, A4);
impl_tool_fn!(A1, A2, A3, A4, A5);
impl_tool_fn!(A1, A2, A3, A4, A5, A6);

/// Adapts a [`ToolFn`] to [`ToolHandler`] using the names from its spec.
pub(crate) struct FnTool<F, Args> {
    func: F,
    names: Vec<String>,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> FnTool<F, Args> {
    pub(crate) fn new(func: F, names: Vec<String>) -> Self {
        Self {
            func,
            names,
            _args: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Args> ToolHandler for FnTool<F, Args>
where
    F: ToolFn<Args>,
    Args: 'static,
{
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        self.func.invoke(&self.names, args)
    }
}

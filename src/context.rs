//! Kernel context: the named symbols handed to a code generator.
//!
//! A context is assembled once per run from three layers of increasing
//! precedence (template defaults, geometry constants, configuration overrides)
//! and then post-processed by the simulation kind.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::config::Configuration;
use crate::geometry::Geometry;
use crate::traits::ContextContributor;
use crate::FloatNum;

#[derive(Debug, Error, PartialEq)]
pub enum ContextError {
    #[error("template `{template}` needs symbol `{symbol}`, which no layer provides")]
    Unresolved {
        template: &'static str,
        symbol: &'static str,
    },
    #[error("symbol `{symbol}` is {found}, expected {expected}")]
    TypeMismatch {
        symbol: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("symbol `{0}` is not defined")]
    Missing(String),
    #[error("unknown kernel template `{0}`")]
    UnknownTemplate(String),
}

/// A typed value shared by configuration lookups and kernel contexts.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(FloatNum),
    Bool(bool),
    Str(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "an integer",
            Value::Float(_) => "a float",
            Value::Bool(_) => "a flag",
            Value::Str(_) => "a string",
        }
    }

    pub fn as_float(&self) -> Option<FloatNum> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as FloatNum),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:e}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<FloatNum> for Value {
    fn from(v: FloatNum) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

/// Ordered symbol table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    symbols: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.symbols.insert(name.to_owned(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.symbols.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlays `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: Context) {
        self.symbols.extend(other.symbols);
    }

    fn require(&self, name: &str) -> Result<&Value, ContextError> {
        self.get(name)
            .ok_or_else(|| ContextError::Missing(name.to_owned()))
    }

    fn mismatch(name: &str, expected: &'static str, found: &Value) -> ContextError {
        ContextError::TypeMismatch {
            symbol: name.to_owned(),
            expected,
            found: found.kind(),
        }
    }

    pub fn float(&self, name: &str) -> Result<FloatNum, ContextError> {
        let v = self.require(name)?;
        v.as_float().ok_or_else(|| Self::mismatch(name, "a float", v))
    }

    pub fn int(&self, name: &str) -> Result<i64, ContextError> {
        let v = self.require(name)?;
        v.as_int().ok_or_else(|| Self::mismatch(name, "an integer", v))
    }

    pub fn flag(&self, name: &str) -> Result<bool, ContextError> {
        let v = self.require(name)?;
        v.as_bool().ok_or_else(|| Self::mismatch(name, "a flag", v))
    }

    pub fn text(&self, name: &str) -> Result<&str, ContextError> {
        let v = self.require(name)?;
        v.as_str().ok_or_else(|| Self::mismatch(name, "a string", v))
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.symbols {
            writeln!(f, "{} = {}", name, value)?;
        }
        Ok(())
    }
}

/// Kernel templates known to the code generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelTemplate {
    /// Single-component fluid, D2Q9 lattice, two-relaxation-time collision.
    SingleFluid,
}

impl KernelTemplate {
    pub fn from_name(name: &str) -> Result<Self, ContextError> {
        match name {
            "single_fluid" => Ok(KernelTemplate::SingleFluid),
            other => Err(ContextError::UnknownTemplate(other.to_owned())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KernelTemplate::SingleFluid => "single_fluid",
        }
    }

    /// Compiled-in defaults, the lowest-precedence layer.
    pub fn defaults(self) -> Context {
        let mut ctx = Context::new();
        match self {
            KernelTemplate::SingleFluid => {
                ctx.set("grid", "D2Q9");
                ctx.set("model", "trt");
                ctx.set("magic", 0.1875);
                ctx.set("rho0", 1.0);
                ctx.set("accel_x", 0.0);
                ctx.set("accel_y", 0.0);
                ctx.set("lid_vx", 0.0);
                ctx.set("lid_vy", 0.0);
                ctx.set("periodic_x", true);
                ctx.set("periodic_y", true);
            }
        }
        ctx
    }

    pub fn required_symbols(self) -> &'static [&'static str] {
        match self {
            KernelTemplate::SingleFluid => &[
                "lat_nx",
                "lat_ny",
                "tau",
                "magic",
                "rho0",
                "accel_x",
                "accel_y",
                "lid_vx",
                "lid_vy",
                "periodic_x",
                "periodic_y",
            ],
        }
    }
}

/// Builds the context for `template`.
///
/// `contributor` adjusts the template defaults before the merge and
/// post-processes the merged result. Any required symbol still missing
/// afterwards is a fatal [`ContextError::Unresolved`].
pub fn build_context(
    config: &Configuration,
    geo: &Geometry,
    template: KernelTemplate,
    contributor: &dyn ContextContributor,
) -> Result<Context, ContextError> {
    let mut ctx = template.defaults();
    contributor.update_defaults(&mut ctx);
    ctx.merge(geo.constants());
    ctx.merge(config.kernel_overrides());
    contributor.update_context(&mut ctx, geo)?;

    for &symbol in template.required_symbols() {
        if !ctx.contains(symbol) {
            return Err(ContextError::Unresolved {
                template: template.name(),
                symbol,
            });
        }
    }
    debug!(template = template.name(), "kernel context:\n{}", ctx);
    Ok(ctx)
}

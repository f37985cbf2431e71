use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::context::ContextError;
pub use crate::geometry::{GeometryError, ShapeMismatch};

/// Boxed error returned by user-supplied hook actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure while executing one step of a materialized kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("non-finite {quantity} at node ({x}, {y}) in iteration {iteration}")]
    NonFinite {
        iteration: u64,
        quantity: &'static str,
        x: usize,
        y: usize,
    },
    #[error("kernel expects a {expected:?} lattice, got {found:?}")]
    Layout {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("kernel step called before init")]
    NotInitialized,
    #[error("{backend} backend: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
}

/// A registered hook action failed.
#[derive(Debug, Error)]
#[error("hook `{action}` failed after iteration {iteration}")]
pub struct HookError {
    pub iteration: u64,
    pub action: String,
    #[source]
    pub source: BoxError,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("cannot register hook at iteration {index}: {reason}")]
    InvalidHookIndex { index: u64, reason: &'static str },
    #[error("simulation already ran; build a new instance")]
    AlreadyRun,
    #[error("no diagnostic was recorded: {0}")]
    MissingDiagnostic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_error_names_action_and_keeps_source() {
        let err = HookError {
            iteration: 7,
            action: "save_output".to_owned(),
            source: "boom".into(),
        };
        assert!(err.to_string().contains("save_output"));
        assert!(err.to_string().contains('7'));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
    }

    #[test]
    fn kernel_error_converts_into_crate_error() {
        let err: Error = KernelError::NotInitialized.into();
        assert!(matches!(err, Error::Kernel(KernelError::NotInitialized)));
    }
}

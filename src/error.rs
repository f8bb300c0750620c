use thiserror::Error;

use crate::circuit::hooks::CircuitFault;

/// Remediation printed when the runtime rejects a module.
pub const COMPILE_HINT: &str = "try running circom with --c to generate C++ witness code instead";

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("failed to compile circuit module: {source}; {hint}")]
    Compile {
        #[source]
        source: wasmer::CompileError,
        hint: &'static str,
    },
    #[error("failed to instantiate circuit module: {0}")]
    Instantiate(#[from] Box<wasmer::InstantiationError>),
    #[error("circuit module does not export `{0}`")]
    MissingExport(&'static str),
    #[error("circuit fault: {0}")]
    Fault(#[from] CircuitFault),
    #[error("circuit module trapped: {0}")]
    Trap(wasmer::RuntimeError),
    #[error("`{0}` returned an unexpected value")]
    UnexpectedReturn(&'static str),
    #[error("witness has {actual} elements but the circuit expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("invalid field element at index {index}: {reason}")]
    InvalidElement { index: usize, reason: String },
    #[error("malformed wtns data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WitnessError {
    /// Recovers a fault raised by `exceptionHandler` from the trap that unwound the module.
    pub fn from_trap(err: wasmer::RuntimeError) -> Self {
        match err.downcast::<CircuitFault>() {
            Ok(fault) => WitnessError::Fault(fault),
            Err(err) => WitnessError::Trap(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, WitnessError>;

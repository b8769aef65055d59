//! Interpreter selection
//!
//! Every dispatch call picks its interpreter fresh from the session's
//! current flags: eager execution off selects the lazy interpreter;
//! eager execution on selects the mirrored interpreter unless the
//! innermost strategy region is explicitly consistent. Nothing caches the
//! choice, so flipping a session flag between two calls changes where the
//! second call runs.

pub mod autograd;
pub mod eager;
pub mod lazy;
pub mod tape;

pub use autograd::AutogradInterpreter;
pub use eager::{EagerConsistentInterpreter, EagerMirroredInterpreter};
pub use lazy::LazyInterpreter;
pub use tape::{GradTape, TapeEntry};

use crate::error::ForgeResult;
use crate::op::{AttrMap, OpExpr};
use crate::session::Session;
use crate::tensor::Tensor;

/// Which execution strategy an interpreter implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterMode {
    Lazy,
    EagerMirrored,
    EagerConsistent,
}

impl InterpreterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpreterMode::Lazy => "lazy",
            InterpreterMode::EagerMirrored => "eager_mirrored",
            InterpreterMode::EagerConsistent => "eager_consistent",
        }
    }
}

impl std::fmt::Display for InterpreterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation interpreter: applies one logical operation to inputs.
pub trait OpInterpreter: Send + Sync {
    fn mode(&self) -> InterpreterMode;

    fn apply(
        &self,
        session: &Session,
        op: &OpExpr,
        inputs: &[Tensor],
        attrs: &AttrMap,
    ) -> ForgeResult<Vec<Tensor>>;
}

static LAZY: LazyInterpreter = LazyInterpreter;
static EAGER_MIRRORED: EagerMirroredInterpreter = EagerMirroredInterpreter;
static EAGER_CONSISTENT: EagerConsistentInterpreter = EagerConsistentInterpreter;

/// Select the interpreter for the session's current flags.
pub fn interpreter_for(session: &Session) -> ForgeResult<&'static dyn OpInterpreter> {
    if !session.eager_execution_enabled() {
        return Ok(&LAZY);
    }
    if session.mirrored_strategy_stack_empty()? || session.is_mirrored_strategy_enabled()? {
        Ok(&EAGER_MIRRORED)
    } else {
        Ok(&EAGER_CONSISTENT)
    }
}

//! Autograd decorator
//!
//! Wraps any interpreter and, when some input tracks gradients, tapes the
//! operation and propagates the tracking flag to the outputs. Forward
//! results are exactly what the wrapped interpreter produced; the
//! decorator never alters values, only flags and the tape.

use crate::error::ForgeResult;
use crate::op::{AttrMap, OpExpr};
use crate::session::Session;
use crate::tensor::Tensor;

use super::tape::{record_entry, TapeEntry};
use super::{InterpreterMode, OpInterpreter};

pub struct AutogradInterpreter<'a> {
    inner: &'a dyn OpInterpreter,
}

impl<'a> AutogradInterpreter<'a> {
    pub fn new(inner: &'a dyn OpInterpreter) -> Self {
        Self { inner }
    }
}

impl OpInterpreter for AutogradInterpreter<'_> {
    fn mode(&self) -> InterpreterMode {
        self.inner.mode()
    }

    fn apply(
        &self,
        session: &Session,
        op: &OpExpr,
        inputs: &[Tensor],
        attrs: &AttrMap,
    ) -> ForgeResult<Vec<Tensor>> {
        let mut outputs = self.inner.apply(session, op, inputs, attrs)?;
        if inputs.iter().any(Tensor::requires_grad) {
            record_entry(TapeEntry {
                op_name: op.op_name().to_string(),
                input_metas: inputs.iter().map(|t| t.meta().clone()).collect(),
                output_metas: outputs.iter().map(|t| t.meta().clone()).collect(),
            });
            for output in &mut outputs {
                output.set_requires_grad(true);
                output.mark_produced_by_op();
            }
        }
        Ok(outputs)
    }
}

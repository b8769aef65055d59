//! Operation dispatch façade
//!
//! The one entry point callers go through to apply a logical operation:
//! validate input arity, pick the interpreter from the session's current
//! flags, run the call through the autograd decorator, and guarantee the
//! output count matches the operation's declared arity. Also home to the
//! blob-level utilities dispatch builds on: the argument-name-to-blob
//! map and the synchronous access-by-callback entry point.

use std::collections::HashMap;
use std::sync::Arc;

use crate::blob::BlobObject;
use crate::device::stream::stream_for;
use crate::error::{ForgeResult, TensorForgeError};
use crate::internal_error;
use crate::interpreter::{interpreter_for, AutogradInterpreter, OpInterpreter};
use crate::op::{AttrMap, OpExpr};
use crate::session::{default_session, Session};
use crate::tensor::Tensor;
use crate::vm::callback::{BlobAccess, ACCESS_BLOB_OP};
use crate::vm::{InstrTypeKey, Instruction, PhyInstrOperand};

/// Apply `op` to `inputs` under an explicit session.
///
/// On success the returned vector's length equals `op.output_size()`,
/// and every output slot holds a real tensor. Callers index outputs by
/// position without further checks.
pub fn dispatch_with_session(
    session: &Session,
    op: &OpExpr,
    inputs: &[Tensor],
    attrs: &AttrMap,
) -> ForgeResult<Vec<Tensor>> {
    if inputs.len() != op.input_size() {
        return Err(TensorForgeError::InputArityMismatch {
            op: op.name().to_string(),
            expected: op.input_size(),
            actual: inputs.len(),
        });
    }
    let interpreter = interpreter_for(session)?;
    tracing::debug!(
        op = op.name(),
        mode = %interpreter.mode(),
        inputs = inputs.len(),
        "dispatch"
    );
    let outputs = AutogradInterpreter::new(interpreter).apply(session, op, inputs, attrs)?;
    if outputs.len() != op.output_size() {
        return Err(internal_error!(
            "op '{}' produced {} outputs, declared {}",
            op.name(),
            outputs.len(),
            op.output_size()
        ));
    }
    Ok(outputs)
}

/// Apply `op` to `inputs` under the process-wide default session.
pub fn dispatch(op: &OpExpr, inputs: &[Tensor], attrs: &AttrMap) -> ForgeResult<Vec<Tensor>> {
    dispatch_with_session(default_session(), op, inputs, attrs)
}

/// Apply a single-output `op` and return that output directly.
pub fn dispatch_single(
    session: &Session,
    op: &OpExpr,
    inputs: &[Tensor],
    attrs: &AttrMap,
) -> ForgeResult<Tensor> {
    if op.output_size() != 1 {
        return Err(internal_error!(
            "op '{}' declares {} outputs, single-output dispatch needs exactly 1",
            op.name(),
            op.output_size()
        ));
    }
    let mut outputs = dispatch_with_session(session, op, inputs, attrs)?;
    // Length checked against output_size above
    Ok(outputs.remove(0))
}

/// The blob object of a consistent eager tensor.
///
/// Group-placed execution paths must not silently accept single-device
/// tensors, so a mirrored tensor is a representation fault here.
pub fn consistent_tensor_blob(tensor: &Tensor) -> ForgeResult<&Arc<BlobObject>> {
    if !tensor.is_consistent() {
        return Err(TensorForgeError::UnsupportedTensorKind {
            expected: "consistent",
            actual: tensor.kind().kind_name(),
        });
    }
    tensor.blob()
}

/// Map the operation's declared input argument names to the input
/// tensors' blob objects, in positional order.
///
/// Serves the group-placed execution path, so every input must be a
/// consistent eager tensor.
pub fn make_bn_to_blob_map(
    op: &OpExpr,
    inputs: &[Tensor],
) -> ForgeResult<HashMap<String, Arc<BlobObject>>> {
    if inputs.len() != op.input_size() {
        return Err(TensorForgeError::InputArityMismatch {
            op: op.name().to_string(),
            expected: op.input_size(),
            actual: inputs.len(),
        });
    }
    let mut map = HashMap::with_capacity(inputs.len());
    for (bn, tensor) in op.indexed_ibns().iter().zip(inputs) {
        map.insert(bn.clone(), Arc::clone(consistent_tensor_blob(tensor)?));
    }
    Ok(map)
}

/// Run a callback against a tensor's bytes from inside the owning
/// device's instruction stream, waiting for it to complete.
///
/// The access is ordered against every other instruction touching the
/// blob on that stream; a mutate access is the sanctioned way to write a
/// live tensor from outside dispatch.
pub fn sync_access_blob_by_callback(tensor: &Tensor, access: BlobAccess) -> ForgeResult<()> {
    let blob = tensor.blob()?;
    let device = tensor.device();
    let key = InstrTypeKey::new(device.tag(), ACCESS_BLOB_OP, device.stream_kind());
    Instruction::lookup_and_new(
        key,
        PhyInstrOperand::AccessBlob {
            blob: Arc::clone(blob),
            access,
        },
        stream_for(device)?,
    )?
    .submit()
}

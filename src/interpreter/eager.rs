//! Eager interpreters
//!
//! Eager dispatch materializes outputs immediately: resolve the
//! instruction type for the operation, allocate output blobs, submit the
//! instruction, and hand back eager tensors. The mirrored interpreter
//! works on single-device tensors; the consistent interpreter works on
//! group-placed tensors and executes on the group's primary device.
//!
//! Only the builtin copy operation has an eager kernel today. Any other
//! operation name is reported as unimplemented rather than silently
//! recorded, so callers never mistake a missing kernel for a result.

use std::sync::Arc;

use crate::blob::BlobObject;
use crate::device::stream::stream_for;
use crate::device::{Device, DeviceTag};
use crate::dispatch::make_bn_to_blob_map;
use crate::error::{ForgeResult, TensorForgeError};
use crate::op::{AttrMap, OpExpr};
use crate::session::Session;
use crate::tensor::{Tensor, TensorKind};
use crate::unimplemented_error;
use crate::vm::copy::COPY_BLOB_OP;
use crate::vm::{InstrTypeKey, Instruction, PhyInstrOperand};

use super::{InterpreterMode, OpInterpreter};

/// Destination device of a copy request, from its `device` attribute.
fn copy_target_device(attrs: &AttrMap) -> ForgeResult<Device> {
    attrs.get_device("device").ok_or_else(|| {
        TensorForgeError::InvalidConfiguration(
            "copy requires a 'device' attribute naming the destination".to_string(),
        )
    })
}

fn arity_fault(op: &OpExpr, actual: usize) -> TensorForgeError {
    TensorForgeError::InputArityMismatch {
        op: op.name().to_string(),
        expected: op.input_size(),
        actual,
    }
}

/// Allocate the destination blob and submit the cross-device copy.
///
/// The registry key's domain names the device family the source data
/// lives on; the stream kind follows the destination device, which also
/// owns the executing stream.
fn submit_copy(
    src: &Arc<BlobObject>,
    src_domain: DeviceTag,
    dst_device: Device,
) -> ForgeResult<Arc<BlobObject>> {
    let dst = Arc::new(BlobObject::allocate(
        src.shape().clone(),
        src.dtype(),
        dst_device.mem_case(),
    )?);
    let key = InstrTypeKey::new(src_domain, COPY_BLOB_OP, dst_device.stream_kind());
    tracing::debug!(key = %key, dst = %dst_device, "eager copy");
    Instruction::lookup_and_new(
        key,
        PhyInstrOperand::CopyBlob {
            src: Arc::clone(src),
            dst: Arc::clone(&dst),
        },
        stream_for(dst_device)?,
    )?
    .submit()?;
    Ok(dst)
}

/// Eager execution over single-device (mirrored) tensors.
pub struct EagerMirroredInterpreter;

impl OpInterpreter for EagerMirroredInterpreter {
    fn mode(&self) -> InterpreterMode {
        InterpreterMode::EagerMirrored
    }

    fn apply(
        &self,
        _session: &Session,
        op: &OpExpr,
        inputs: &[Tensor],
        attrs: &AttrMap,
    ) -> ForgeResult<Vec<Tensor>> {
        for input in inputs {
            if !input.is_mirrored() {
                return Err(TensorForgeError::UnsupportedTensorKind {
                    expected: "mirrored",
                    actual: input.kind().kind_name(),
                });
            }
        }
        match op.op_name() {
            "copy" => {
                let input = match inputs {
                    [input] => input,
                    _ => return Err(arity_fault(op, inputs.len())),
                };
                let dst_device = copy_target_device(attrs)?;
                let dst = submit_copy(input.blob()?, input.device().tag(), dst_device)?;
                let mut out = Tensor::from_blob(dst);
                out.mark_produced_by_op();
                Ok(vec![out])
            }
            other => Err(unimplemented_error!("eager mirrored kernel for op '{}'", other)),
        }
    }
}

/// Eager execution over group-placed (consistent) tensors.
pub struct EagerConsistentInterpreter;

impl OpInterpreter for EagerConsistentInterpreter {
    fn mode(&self) -> InterpreterMode {
        InterpreterMode::EagerConsistent
    }

    fn apply(
        &self,
        _session: &Session,
        op: &OpExpr,
        inputs: &[Tensor],
        attrs: &AttrMap,
    ) -> ForgeResult<Vec<Tensor>> {
        // Validates arity and the consistent-eager requirement in one step.
        let blobs = make_bn_to_blob_map(op, inputs)?;
        match op.op_name() {
            "copy" => {
                let input = match inputs {
                    [input] => input,
                    _ => return Err(arity_fault(op, inputs.len())),
                };
                let distribute = match input.kind() {
                    TensorKind::Consistent { distribute, .. } => *distribute,
                    TensorKind::Mirrored { .. } => unreachable!("checked by the blob map"),
                };
                let dst_device = copy_target_device(attrs)?;
                let src = &blobs[op.indexed_ibns()[0].as_str()];
                let dst = submit_copy(src, input.device().tag(), dst_device)?;
                // The result lives on a single-device group at the target.
                let parallel = crate::tensor::ParallelDesc::new(
                    dst_device.tag(),
                    vec![dst_device.ordinal()],
                )?;
                let mut out = Tensor::consistent_from_blob(dst, parallel, distribute);
                out.mark_produced_by_op();
                Ok(vec![out])
            }
            other => Err(unimplemented_error!(
                "eager consistent kernel for op '{}'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::AttrValue;
    use crate::tensor::{DType, Distribute, ParallelDesc, Shape};

    fn copy_attrs(dst: Device) -> AttrMap {
        AttrMap::new().with("device", AttrValue::Device(dst))
    }

    fn mirrored_input(device: Device) -> Tensor {
        Tensor::from_bytes(Shape::new([4]), DType::U8, device, vec![7, 8, 9, 10]).unwrap()
    }

    #[test]
    fn test_mirrored_copy_moves_bytes() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let input = mirrored_input(Device::cpu());

        let outputs = EagerMirroredInterpreter
            .apply(&session, &op, &[input.clone()], &copy_attrs(Device::accel(1)))
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].device(), Device::accel(1));
        assert_eq!(outputs[0].to_bytes().unwrap(), vec![7, 8, 9, 10]);
        assert!(!outputs[0].is_leaf());
        // Source unchanged
        assert_eq!(input.to_bytes().unwrap(), vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_mirrored_rejects_consistent_input() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let blob = Arc::new(
            BlobObject::from_bytes(
                Shape::new([2]),
                DType::U8,
                Device::cpu().mem_case(),
                vec![1, 2],
            )
            .unwrap(),
        );
        let input = Tensor::consistent_from_blob(blob, ParallelDesc::cpu(), Distribute::Broadcast);
        let err = EagerMirroredInterpreter
            .apply(&session, &op, &[input], &copy_attrs(Device::cpu()))
            .unwrap_err();
        assert!(matches!(
            err,
            TensorForgeError::UnsupportedTensorKind {
                expected: "mirrored",
                actual: "consistent",
            }
        ));
    }

    #[test]
    fn test_consistent_rejects_mirrored_input() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let err = EagerConsistentInterpreter
            .apply(
                &session,
                &op,
                &[mirrored_input(Device::cpu())],
                &copy_attrs(Device::accel(0)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TensorForgeError::UnsupportedTensorKind {
                expected: "consistent",
                actual: "mirrored",
            }
        ));
    }

    #[test]
    fn test_consistent_copy_lands_on_target_group() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let blob = Arc::new(
            BlobObject::from_bytes(
                Shape::new([2]),
                DType::U8,
                Device::accel(0).mem_case(),
                vec![5, 6],
            )
            .unwrap(),
        );
        let parallel = ParallelDesc::new(crate::device::DeviceTag::Accel, [0, 1]).unwrap();
        let input = Tensor::consistent_from_blob(blob, parallel, Distribute::Split { axis: 0 });

        let outputs = EagerConsistentInterpreter
            .apply(&session, &op, &[input], &copy_attrs(Device::cpu()))
            .unwrap();
        let out = &outputs[0];
        assert!(out.is_consistent());
        assert_eq!(out.device(), Device::cpu());
        assert_eq!(out.to_bytes().unwrap(), vec![5, 6]);
        match out.kind() {
            TensorKind::Consistent { distribute, .. } => {
                assert_eq!(*distribute, Distribute::Split { axis: 0 });
            }
            TensorKind::Mirrored { .. } => panic!("expected consistent output"),
        }
    }

    #[test]
    fn test_mirrored_apply_checks_arity_itself() {
        // Direct interpreter use bypasses the dispatch facade, so the
        // interpreter must fault on a missing input rather than panic.
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let err = EagerMirroredInterpreter
            .apply(&session, &op, &[], &copy_attrs(Device::cpu()))
            .unwrap_err();
        assert!(matches!(
            err,
            TensorForgeError::InputArityMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_consistent_apply_checks_arity_itself() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let err = EagerConsistentInterpreter
            .apply(&session, &op, &[], &copy_attrs(Device::cpu()))
            .unwrap_err();
        assert!(matches!(
            err,
            TensorForgeError::InputArityMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_op_is_unimplemented() {
        let session = Session::new();
        let op = OpExpr::new(
            "relu_0",
            "relu",
            vec!["in_0".to_string()],
            vec!["out_0".to_string()],
            crate::op::identity_infer,
        );
        let err = EagerMirroredInterpreter
            .apply(
                &session,
                &op,
                &[mirrored_input(Device::cpu())],
                &AttrMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, TensorForgeError::Unimplemented(_)));
    }

    #[test]
    fn test_copy_without_device_attr_is_rejected() {
        let session = Session::new();
        let op = OpExpr::copy("copy_x");
        let err = EagerMirroredInterpreter
            .apply(
                &session,
                &op,
                &[mirrored_input(Device::cpu())],
                &AttrMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, TensorForgeError::InvalidConfiguration(_)));
    }
}

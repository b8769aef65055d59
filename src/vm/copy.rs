//! Cross-device blob copy instruction family
//!
//! The canonical data-movement instruction: validate that source and
//! destination buffers have identical byte size, then issue the memory
//! copy appropriate to the two memory cases through the destination
//! stream's device context. Size validation happens in the Infer phase so
//! a mismatch rejects the instruction before any byte moves.

use std::sync::Arc;

use crate::device::{DeviceTag, StreamKind};
use crate::error::{ForgeResult, TensorForgeError};
use crate::vm::registry::{InstrTypeKey, InstructionTypeRegistry};
use crate::vm::{Instruction, InstructionType};

/// Logical operation name for the copy family
pub const COPY_BLOB_OP: &str = "CopyBlobToOtherDevice";

fn copy_infer(instruction: &Instruction) -> ForgeResult<()> {
    let (src, dst) = instruction.operand().expect_copy();
    if src.byte_len() != dst.byte_len() {
        return Err(TensorForgeError::ByteSizeMismatch {
            src: src.byte_len(),
            dst: dst.byte_len(),
        });
    }
    Ok(())
}

fn copy_compute(instruction: &Instruction) -> ForgeResult<()> {
    let (src, dst) = instruction.operand().expect_copy();
    let ctx = instruction.stream().device_ctx();
    // Snapshot the source so the write lock on dst is the only lock held
    // during the copy (src and dst may alias in pathological callers).
    let src_bytes = src.to_vec()?;
    dst.with_bytes_mut(|d| ctx.sync_auto_memcpy(d, &src_bytes, src.mem_case(), dst.mem_case()))?
}

/// Copy executed on a CPU-queue stream
pub struct CpuCopyBlobToOtherDevice;

impl InstructionType for CpuCopyBlobToOtherDevice {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Cpu
    }

    fn infer(&self, instruction: &Instruction) -> ForgeResult<()> {
        copy_infer(instruction)
    }

    fn compute(&self, instruction: &Instruction) -> ForgeResult<()> {
        copy_compute(instruction)
    }
}

/// Copy executed on an accelerator-queue stream
pub struct AccelCopyBlobToOtherDevice;

impl InstructionType for AccelCopyBlobToOtherDevice {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Accel
    }

    fn infer(&self, instruction: &Instruction) -> ForgeResult<()> {
        copy_infer(instruction)
    }

    fn compute(&self, instruction: &Instruction) -> ForgeResult<()> {
        copy_compute(instruction)
    }
}

/// Register the copy family: one entry per (source domain, stream kind).
pub(crate) fn register(registry: &InstructionTypeRegistry) -> ForgeResult<()> {
    for domain in [DeviceTag::Cpu, DeviceTag::Accel] {
        registry.register(
            InstrTypeKey::new(domain, COPY_BLOB_OP, StreamKind::Cpu),
            Arc::new(CpuCopyBlobToOtherDevice),
        )?;
        registry.register(
            InstrTypeKey::new(domain, COPY_BLOB_OP, StreamKind::Accel),
            Arc::new(AccelCopyBlobToOtherDevice),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobObject;
    use crate::device::stream::stream_for;
    use crate::device::Device;
    use crate::tensor::{DType, Shape};
    use crate::vm::PhyInstrOperand;

    fn blob_on(device: Device, bytes: Vec<u8>) -> Arc<BlobObject> {
        Arc::new(
            BlobObject::from_bytes(
                Shape::new([bytes.len()]),
                DType::U8,
                device.mem_case(),
                bytes,
            )
            .unwrap(),
        )
    }

    fn copy_instruction(src: Arc<BlobObject>, dst: Arc<BlobObject>) -> Instruction {
        let dst_device = dst.mem_case().device();
        let key = InstrTypeKey::new(
            src.mem_case().device().tag(),
            COPY_BLOB_OP,
            dst_device.stream_kind(),
        );
        Instruction::lookup_and_new(
            key,
            PhyInstrOperand::CopyBlob { src, dst },
            stream_for(dst_device).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_copy_all_mem_case_pairings() {
        let devices = [Device::cpu(), Device::accel(0), Device::accel(1)];
        for src_dev in devices {
            for dst_dev in devices {
                let src = blob_on(src_dev, vec![1, 2, 3, 4]);
                let dst = blob_on(dst_dev, vec![0; 4]);
                copy_instruction(Arc::clone(&src), Arc::clone(&dst))
                    .submit()
                    .unwrap();
                assert_eq!(
                    dst.to_vec().unwrap(),
                    vec![1, 2, 3, 4],
                    "copy {} -> {}",
                    src_dev,
                    dst_dev
                );
                // Source stays untouched
                assert_eq!(src.to_vec().unwrap(), vec![1, 2, 3, 4]);
            }
        }
    }

    #[test]
    fn test_size_mismatch_rejected_before_copy() {
        let src = blob_on(Device::cpu(), vec![1, 2, 3, 4]);
        let dst = blob_on(Device::accel(0), vec![9, 9]);
        let instruction = copy_instruction(Arc::clone(&src), Arc::clone(&dst));
        let err = instruction.submit().unwrap_err();
        assert!(matches!(err, TensorForgeError::ByteSizeMismatch { .. }));
        // Rejected in Infer: destination bytes untouched
        assert_eq!(dst.to_vec().unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_infer_does_not_touch_buffers() {
        let src = blob_on(Device::accel(0), vec![5, 6, 7, 8]);
        let dst = blob_on(Device::accel(1), vec![0; 4]);
        let instruction = copy_instruction(Arc::clone(&src), Arc::clone(&dst));

        let src_before = src.to_vec().unwrap();
        let dst_before = dst.to_vec().unwrap();
        instruction.infer().unwrap();
        assert_eq!(src.to_vec().unwrap(), src_before);
        assert_eq!(dst.to_vec().unwrap(), dst_before);
    }
}

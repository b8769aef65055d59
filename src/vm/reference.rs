//! Lazy-reference instruction family
//!
//! A pure liveness operation: the operand holds a blob reference so the
//! blob cannot be released while earlier instructions on the stream may
//! still touch it. Compute moves no data, but the instruction still goes
//! through the Infer/Compute protocol so it orders correctly against the
//! rest of the stream.

use std::sync::Arc;

use crate::device::{DeviceTag, StreamKind};
use crate::error::ForgeResult;
use crate::vm::registry::{InstrTypeKey, InstructionTypeRegistry};
use crate::vm::{Instruction, InstructionType};

/// Logical operation name for the lazy-reference family
pub const LAZY_REFERENCE_OP: &str = "LazyReference";

/// Lazy reference pinned through a CPU-queue stream
pub struct CpuLazyReference;

impl InstructionType for CpuLazyReference {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Cpu
    }

    fn infer(&self, instruction: &Instruction) -> ForgeResult<()> {
        // Touching the operand validates the variant; metadata only.
        let _blob = instruction.operand().expect_lazy_reference();
        Ok(())
    }

    fn compute(&self, _instruction: &Instruction) -> ForgeResult<()> {
        // No data movement: the operand's reference is the whole effect.
        Ok(())
    }
}

/// Lazy reference pinned through an accelerator-queue stream
pub struct AccelLazyReference;

impl InstructionType for AccelLazyReference {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Accel
    }

    fn infer(&self, instruction: &Instruction) -> ForgeResult<()> {
        let _blob = instruction.operand().expect_lazy_reference();
        Ok(())
    }

    fn compute(&self, _instruction: &Instruction) -> ForgeResult<()> {
        Ok(())
    }
}

pub(crate) fn register(registry: &InstructionTypeRegistry) -> ForgeResult<()> {
    registry.register(
        InstrTypeKey::new(DeviceTag::Cpu, LAZY_REFERENCE_OP, StreamKind::Cpu),
        Arc::new(CpuLazyReference),
    )?;
    registry.register(
        InstrTypeKey::new(DeviceTag::Accel, LAZY_REFERENCE_OP, StreamKind::Accel),
        Arc::new(AccelLazyReference),
    )?;
    Ok(())
}

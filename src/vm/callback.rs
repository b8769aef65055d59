//! Blob access-by-callback instruction family
//!
//! Runs a caller-supplied callback against a blob's bytes from inside the
//! instruction stream, so the access is ordered against every other
//! instruction touching the same blob on that stream. Read access sees
//! the bytes; mutate access is the one sanctioned way for callers to
//! write a live blob.

use std::sync::Arc;

use crate::device::{DeviceTag, StreamKind};
use crate::error::ForgeResult;
use crate::vm::registry::{InstrTypeKey, InstructionTypeRegistry};
use crate::vm::{Instruction, InstructionType};

/// Logical operation name for the access family
pub const ACCESS_BLOB_OP: &str = "AccessBlobByCallback";

/// Caller callback plus the access right it was granted.
#[derive(Clone)]
pub enum BlobAccess {
    /// Read-only view of the blob's bytes
    Read(Arc<dyn Fn(&[u8]) + Send + Sync>),
    /// Mutable view; runs as the blob's single legitimate writer
    Mutate(Arc<dyn Fn(&mut [u8]) + Send + Sync>),
}

impl BlobAccess {
    pub fn reads_only(&self) -> bool {
        matches!(self, BlobAccess::Read(_))
    }
}

fn access_compute(instruction: &Instruction) -> ForgeResult<()> {
    let (blob, access) = instruction.operand().expect_access();
    match access {
        BlobAccess::Read(callback) => blob.with_bytes(|bytes| callback(bytes)),
        BlobAccess::Mutate(callback) => blob.with_bytes_mut(|bytes| callback(bytes)),
    }
}

/// Blob access executed on a CPU-queue stream
pub struct CpuAccessBlobByCallback;

impl InstructionType for CpuAccessBlobByCallback {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Cpu
    }

    fn infer(&self, _instruction: &Instruction) -> ForgeResult<()> {
        // Metadata-only phase; the callback runs in Compute.
        Ok(())
    }

    fn compute(&self, instruction: &Instruction) -> ForgeResult<()> {
        access_compute(instruction)
    }
}

/// Blob access executed on an accelerator-queue stream
pub struct AccelAccessBlobByCallback;

impl InstructionType for AccelAccessBlobByCallback {
    fn stream_kind(&self) -> StreamKind {
        StreamKind::Accel
    }

    fn infer(&self, _instruction: &Instruction) -> ForgeResult<()> {
        Ok(())
    }

    fn compute(&self, instruction: &Instruction) -> ForgeResult<()> {
        access_compute(instruction)
    }
}

/// Register the access family: the callback runs on the queue of the
/// device the blob lives on, so domain and stream kind coincide.
pub(crate) fn register(registry: &InstructionTypeRegistry) -> ForgeResult<()> {
    registry.register(
        InstrTypeKey::new(DeviceTag::Cpu, ACCESS_BLOB_OP, StreamKind::Cpu),
        Arc::new(CpuAccessBlobByCallback),
    )?;
    registry.register(
        InstrTypeKey::new(DeviceTag::Accel, ACCESS_BLOB_OP, StreamKind::Accel),
        Arc::new(AccelAccessBlobByCallback),
    )?;
    Ok(())
}

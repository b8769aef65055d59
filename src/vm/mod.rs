//! Instruction model: physical units of device work
//!
//! An [`Instruction`] couples a registered [`InstructionType`] with an
//! immutable [`PhyInstrOperand`] and a target stream. Instruction types
//! implement a two-phase protocol: `infer` validates shapes, dtypes, and
//! memory-case metadata without touching buffer contents; `compute`
//! performs the actual device work. Infer always runs before Compute, and
//! a fault in Infer aborts the instruction before any buffer mutation.
//!
//! Operands are a tagged variant checked once at construction. An
//! instruction type receiving the wrong variant is a programming error
//! and fails fast with a panic, never silently skipping the instruction:
//! skipping would corrupt the buffer state observed by later instructions
//! on the same stream.

pub mod callback;
pub mod copy;
pub mod reference;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::blob::BlobObject;
use crate::device::stream::Stream;
use crate::device::StreamKind;
use crate::error::ForgeResult;
use crate::internal_error;

pub use callback::BlobAccess;
pub use registry::{
    global_registry, lookup_instruction_type, register_instruction_type, InstrTypeKey,
    InstructionTypeRegistry,
};

/// Polymorphic unit of device work, bound to exactly one stream kind.
///
/// The logical operation (copy a blob, run a callback against a blob,
/// keep a lazy reference alive) is registered once per stream kind that
/// can execute it; dispatch resolves the concrete type through the
/// registry instead of branching on device kind inline.
pub trait InstructionType: Send + Sync {
    /// The stream kind this instruction type executes on
    fn stream_kind(&self) -> StreamKind;

    /// Shape/metadata phase. Must not read or write buffer contents.
    fn infer(&self, instruction: &Instruction) -> ForgeResult<()>;

    /// Device-work phase: reads input buffers, writes output buffers,
    /// using the stream's device context for device calls.
    fn compute(&self, instruction: &Instruction) -> ForgeResult<()>;
}

impl std::fmt::Debug for dyn InstructionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionType")
            .field("stream_kind", &self.stream_kind())
            .finish()
    }
}

/// Immutable operand bundle an instruction type consumes.
///
/// Variants carry their concrete payload directly; the variant is fixed
/// when the dispatching interpreter constructs the instruction.
#[derive(Clone)]
pub enum PhyInstrOperand {
    /// Copy `src`'s buffer into `dst`'s buffer across memory cases
    CopyBlob {
        src: Arc<BlobObject>,
        dst: Arc<BlobObject>,
    },
    /// Run a caller callback against a blob's bytes
    AccessBlob {
        blob: Arc<BlobObject>,
        access: BlobAccess,
    },
    /// Pure liveness operand: keeps the blob referenced, moves no data
    LazyReference { blob: Arc<BlobObject> },
}

impl PhyInstrOperand {
    pub fn variant_name(&self) -> &'static str {
        match self {
            PhyInstrOperand::CopyBlob { .. } => "CopyBlob",
            PhyInstrOperand::AccessBlob { .. } => "AccessBlob",
            PhyInstrOperand::LazyReference { .. } => "LazyReference",
        }
    }

    /// Ordered input blob references
    pub fn input_blobs(&self) -> Vec<&Arc<BlobObject>> {
        match self {
            PhyInstrOperand::CopyBlob { src, .. } => vec![src],
            PhyInstrOperand::AccessBlob { blob, .. } => vec![blob],
            PhyInstrOperand::LazyReference { blob } => vec![blob],
        }
    }

    /// Ordered output blob references
    pub fn output_blobs(&self) -> Vec<&Arc<BlobObject>> {
        match self {
            PhyInstrOperand::CopyBlob { dst, .. } => vec![dst],
            PhyInstrOperand::AccessBlob { blob, access } => match access {
                BlobAccess::Mutate(_) => vec![blob],
                BlobAccess::Read(_) => vec![],
            },
            PhyInstrOperand::LazyReference { .. } => vec![],
        }
    }

    /// The copy payload.
    ///
    /// # Panics
    /// Panics if this operand is not `CopyBlob`: a wrong operand variant
    /// for the executing instruction type is an unrecoverable programming
    /// error.
    pub fn expect_copy(&self) -> (&Arc<BlobObject>, &Arc<BlobObject>) {
        match self {
            PhyInstrOperand::CopyBlob { src, dst } => (src, dst),
            other => panic!(
                "instruction operand mismatch: expected CopyBlob, got {}",
                other.variant_name()
            ),
        }
    }

    /// The blob-access payload.
    ///
    /// # Panics
    /// Panics if this operand is not `AccessBlob`.
    pub fn expect_access(&self) -> (&Arc<BlobObject>, &BlobAccess) {
        match self {
            PhyInstrOperand::AccessBlob { blob, access } => (blob, access),
            other => panic!(
                "instruction operand mismatch: expected AccessBlob, got {}",
                other.variant_name()
            ),
        }
    }

    /// The lazy-reference payload.
    ///
    /// # Panics
    /// Panics if this operand is not `LazyReference`.
    pub fn expect_lazy_reference(&self) -> &Arc<BlobObject> {
        match self {
            PhyInstrOperand::LazyReference { blob } => blob,
            other => panic!(
                "instruction operand mismatch: expected LazyReference, got {}",
                other.variant_name()
            ),
        }
    }
}

impl fmt::Debug for PhyInstrOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhyInstrOperand")
            .field("variant", &self.variant_name())
            .field("inputs", &self.input_blobs().len())
            .field("outputs", &self.output_blobs().len())
            .finish()
    }
}

/// One queued unit of device work.
///
/// Referenced blob objects outlive the operand; the operand lives until
/// the instruction completes.
pub struct Instruction {
    key: InstrTypeKey,
    instr_type: Arc<dyn InstructionType>,
    operand: PhyInstrOperand,
    stream: Arc<Stream>,
}

impl Instruction {
    /// Build an instruction for a resolved instruction type.
    ///
    /// The instruction type's stream kind must match the target stream's
    /// kind; a mismatch means the registry key was resolved against the
    /// wrong stream and is reported as an internal fault.
    pub fn new(
        key: InstrTypeKey,
        instr_type: Arc<dyn InstructionType>,
        operand: PhyInstrOperand,
        stream: Arc<Stream>,
    ) -> ForgeResult<Self> {
        if instr_type.stream_kind() != stream.kind() {
            return Err(internal_error!(
                "instruction type {} targets {} streams, stream is {}",
                key,
                instr_type.stream_kind(),
                stream.kind()
            ));
        }
        Ok(Self {
            key,
            instr_type,
            operand,
            stream,
        })
    }

    /// Resolve the instruction type for `key` in the process registry and
    /// build the instruction.
    pub fn lookup_and_new(
        key: InstrTypeKey,
        operand: PhyInstrOperand,
        stream: Arc<Stream>,
    ) -> ForgeResult<Self> {
        let instr_type = lookup_instruction_type(&key)?;
        Self::new(key, instr_type, operand, stream)
    }

    pub fn operand(&self) -> &PhyInstrOperand {
        &self.operand
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub fn key(&self) -> &InstrTypeKey {
        &self.key
    }

    pub fn instruction_type_name(&self) -> String {
        self.key.to_string()
    }

    /// Run the metadata phase
    pub fn infer(&self) -> ForgeResult<()> {
        self.instr_type.infer(self)
    }

    /// Run the device-work phase
    pub fn compute(&self) -> ForgeResult<()> {
        self.instr_type.compute(self)
    }

    /// Submit this instruction onto its stream (Infer, then Compute, in
    /// submission order).
    pub fn submit(&self) -> ForgeResult<()> {
        self.stream.submit(self)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("key", &self.key)
            .field("operand", &self.operand.variant_name())
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, MemCase};
    use crate::tensor::{DType, Shape};

    fn host_blob(bytes: Vec<u8>) -> Arc<BlobObject> {
        Arc::new(
            BlobObject::from_bytes(Shape::new([bytes.len()]), DType::U8, MemCase::Host, bytes)
                .unwrap(),
        )
    }

    #[test]
    fn test_operand_input_output_lists() {
        let src = host_blob(vec![1, 2]);
        let dst = host_blob(vec![0, 0]);
        let operand = PhyInstrOperand::CopyBlob {
            src: Arc::clone(&src),
            dst: Arc::clone(&dst),
        };
        assert_eq!(operand.input_blobs().len(), 1);
        assert_eq!(operand.output_blobs().len(), 1);

        let operand = PhyInstrOperand::LazyReference { blob: src };
        assert_eq!(operand.input_blobs().len(), 1);
        assert!(operand.output_blobs().is_empty());
    }

    #[test]
    #[should_panic(expected = "instruction operand mismatch")]
    fn test_wrong_operand_variant_panics() {
        let blob = host_blob(vec![1]);
        let operand = PhyInstrOperand::LazyReference { blob };
        operand.expect_copy();
    }

    #[test]
    fn test_instruction_rejects_stream_kind_mismatch() {
        let src = host_blob(vec![1]);
        let dst = host_blob(vec![0]);
        let key = InstrTypeKey::new(
            crate::device::DeviceTag::Cpu,
            copy::COPY_BLOB_OP,
            crate::device::StreamKind::Cpu,
        );
        let instr_type = lookup_instruction_type(&key).unwrap();
        // Cpu-kind instruction type against an accel stream
        let stream = crate::device::stream::stream_for(Device::accel(0)).unwrap();
        let result = Instruction::new(
            key,
            instr_type,
            PhyInstrOperand::CopyBlob { src, dst },
            stream,
        );
        assert!(result.is_err());
    }
}

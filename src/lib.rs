//! TensorForge: an operation dispatch and instruction execution runtime
//!
//! Logical operations enter through the dispatch façade, which selects an
//! interpreter (lazy recording, eager single-device, or eager
//! group-placed) fresh from the session's flags on every call. Eager
//! interpreters lower operations to instructions resolved through the
//! process-wide instruction type registry and submit them to per-device
//! streams, where each instruction runs its Infer phase before Compute.
//! Tensors own blob objects placed by memory case; the autograd decorator
//! tapes gradient-tracked calls without altering forward results.

pub mod blob;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod interpreter;
pub mod logging;
pub mod op;
pub mod scope;
pub mod session;
pub mod tensor;
pub mod vm;

pub use blob::BlobObject;
pub use device::{Device, DeviceTag, MemCase, StreamKind};
pub use dispatch::{dispatch, dispatch_single, dispatch_with_session, sync_access_blob_by_callback};
pub use error::{ErrorCategory, ForgeResult, TensorForgeError};
pub use interpreter::{interpreter_for, InterpreterMode, OpInterpreter};
pub use op::{AttrMap, AttrValue, OpExpr};
pub use session::{default_session, Session};
pub use tensor::{DType, Distribute, ParallelDesc, Shape, Tensor, TensorKind, TensorMeta};
pub use vm::{BlobAccess, InstrTypeKey, Instruction, InstructionType, PhyInstrOperand};

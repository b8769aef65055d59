//! Ordered execution streams
//!
//! A [`Stream`] is one ordered execution queue bound to one device.
//! Instructions submitted to the same stream run in submission order;
//! instructions on different streams may run concurrently and need
//! explicit synchronization when they share a blob.
//!
//! With emulated devices there is no driver queue to defer into, so
//! `submit` runs the instruction's Infer and Compute phases synchronously
//! while holding the stream's ordering guard. A driver-backed stream would
//! enqueue Compute asynchronously behind the same guard; the submission
//! API and the ordering guarantee are unchanged.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::device::{Device, DeviceCtx, StreamKind};
use crate::error::ForgeResult;
use crate::vm::Instruction;

/// One ordered, device-bound execution queue.
pub struct Stream {
    device: Device,
    kind: StreamKind,
    ctx: DeviceCtx,
    /// Ordering guard: holds the submission sequence number. Instructions
    /// on this stream execute strictly in the order submit() was entered.
    order: Mutex<u64>,
}

impl Stream {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            kind: device.stream_kind(),
            ctx: DeviceCtx::new(device),
            order: Mutex::new(0),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// The device context instruction types use to issue work
    pub fn device_ctx(&self) -> &DeviceCtx {
        &self.ctx
    }

    /// Submit one instruction: Infer, then Compute, in submission order.
    ///
    /// A fault during Infer aborts the instruction before Compute runs,
    /// so no partial buffer mutation is observable.
    pub fn submit(&self, instruction: &Instruction) -> ForgeResult<()> {
        let mut seq = self.order.lock()?;
        *seq += 1;
        tracing::trace!(
            stream = %self.device,
            seq = *seq,
            op = instruction.instruction_type_name(),
            "submitting instruction"
        );
        instruction.infer()?;
        instruction.compute()
    }

    /// Block until all submitted instructions have completed.
    ///
    /// Compute runs synchronously at submit for emulated devices, so this
    /// only has to take and release the ordering guard.
    pub fn synchronize(&self) -> ForgeResult<()> {
        let _seq = self.order.lock()?;
        Ok(())
    }

    /// Number of instructions submitted to this stream so far
    pub fn submitted_count(&self) -> ForgeResult<u64> {
        Ok(*self.order.lock()?)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("device", &self.device)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Process-wide stream pool: one stream per device.
///
/// Keeping a single stream per device makes same-device submissions from
/// different dispatch calls land on one queue, which is what gives
/// writer-before-reader ordering for blobs shared across calls.
static STREAM_POOL: Lazy<Mutex<HashMap<Device, Arc<Stream>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The process-wide stream for `device`, created on first use.
pub fn stream_for(device: Device) -> ForgeResult<Arc<Stream>> {
    let mut pool = STREAM_POOL.lock()?;
    let stream = pool
        .entry(device)
        .or_insert_with(|| Arc::new(Stream::new(device)));
    Ok(Arc::clone(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceTag;

    #[test]
    fn test_stream_bound_to_device() {
        let stream = Stream::new(Device::accel(1));
        assert_eq!(stream.device(), Device::accel(1));
        assert_eq!(stream.kind(), StreamKind::Accel);
        assert_eq!(stream.device_ctx().device().tag(), DeviceTag::Accel);
    }

    #[test]
    fn test_stream_pool_returns_same_stream_per_device() {
        let a = stream_for(Device::accel(7)).unwrap();
        let b = stream_for(Device::accel(7)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = stream_for(Device::accel(8)).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_synchronize_on_idle_stream() {
        let stream = Stream::new(Device::cpu());
        stream.synchronize().unwrap();
        assert_eq!(stream.submitted_count().unwrap(), 0);
    }
}

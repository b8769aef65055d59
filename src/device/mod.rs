//! Device, memory-case, and stream-kind model
//!
//! A [`Device`] names one execution unit (the host CPU or one accelerator
//! ordinal). A [`MemCase`] records which device's memory a buffer lives in.
//! A [`StreamKind`] selects the instruction-type family that can execute on
//! a device's queue.
//!
//! Accelerator memory is emulated in this crate: buffers tagged with a
//! device memory case are host allocations, and the memcpy kind between two
//! memory cases is still derived and logged exactly as a driver-backed
//! backend would do it. The ordering and placement semantics are identical;
//! only the physical transport differs.

pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ForgeResult;
use crate::internal_error;

/// Device family tag: which kind of execution unit a device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceTag {
    /// Host CPU
    Cpu,
    /// Accelerator device (emulated)
    Accel,
}

impl DeviceTag {
    /// Short tag string used in registry keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTag::Cpu => "cpu",
            DeviceTag::Accel => "accel",
        }
    }

    /// The stream kind that executes work for this device family
    pub fn stream_kind(&self) -> StreamKind {
        match self {
            DeviceTag::Cpu => StreamKind::Cpu,
            DeviceTag::Accel => StreamKind::Accel,
        }
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of execution queue an instruction type binds to.
///
/// Each concrete instruction type is registered for exactly one stream
/// kind; the same logical operation gets one registration per kind that
/// can execute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Host CPU queue
    Cpu,
    /// Accelerator queue
    Accel,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Cpu => "cpu",
            StreamKind::Accel => "accel",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete device: a family tag plus an ordinal within the family.
///
/// The host CPU is ordinal 0 of the `Cpu` family; accelerators are
/// numbered from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    tag: DeviceTag,
    ordinal: u32,
}

impl Device {
    pub fn new(tag: DeviceTag, ordinal: u32) -> Self {
        Self { tag, ordinal }
    }

    /// The host CPU device
    pub fn cpu() -> Self {
        Self::new(DeviceTag::Cpu, 0)
    }

    /// Accelerator device with the given ordinal
    pub fn accel(ordinal: u32) -> Self {
        Self::new(DeviceTag::Accel, ordinal)
    }

    pub fn tag(&self) -> DeviceTag {
        self.tag
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// The memory case for buffers resident on this device
    pub fn mem_case(&self) -> MemCase {
        match self.tag {
            DeviceTag::Cpu => MemCase::Host,
            DeviceTag::Accel => MemCase::Device {
                ordinal: self.ordinal,
            },
        }
    }

    /// The stream kind for queues bound to this device
    pub fn stream_kind(&self) -> StreamKind {
        self.tag.stream_kind()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.ordinal)
    }
}

/// Descriptor of which device's memory a buffer resides in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemCase {
    /// Host (pageable) memory
    Host,
    /// Memory owned by the accelerator with the given ordinal
    Device { ordinal: u32 },
}

impl MemCase {
    /// The device that owns this memory
    pub fn device(&self) -> Device {
        match self {
            MemCase::Host => Device::cpu(),
            MemCase::Device { ordinal } => Device::accel(*ordinal),
        }
    }
}

impl fmt::Display for MemCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemCase::Host => write!(f, "host"),
            MemCase::Device { ordinal } => write!(f, "device-{}", ordinal),
        }
    }
}

/// Direction of a memory copy, derived from the (src, dst) memory cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemcpyKind {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

impl MemcpyKind {
    /// Derive the copy direction from source and destination memory cases
    pub fn between(src: MemCase, dst: MemCase) -> Self {
        match (src, dst) {
            (MemCase::Host, MemCase::Host) => MemcpyKind::HostToHost,
            (MemCase::Host, MemCase::Device { .. }) => MemcpyKind::HostToDevice,
            (MemCase::Device { .. }, MemCase::Host) => MemcpyKind::DeviceToHost,
            (MemCase::Device { .. }, MemCase::Device { .. }) => MemcpyKind::DeviceToDevice,
        }
    }
}

/// Device context bound to one device.
///
/// Supplies the handle instruction types need to issue device work. For
/// the emulated accelerator this is a plain byte copy; the copy-kind
/// derivation and the size invariant are the same as a driver-backed
/// implementation.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCtx {
    device: Device,
}

impl DeviceCtx {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Synchronous memory copy between two memory cases.
    ///
    /// `dst` and `src` must have identical length; the caller validates
    /// byte sizes before issuing the copy, so a mismatch here is a bug.
    pub fn sync_auto_memcpy(
        &self,
        dst: &mut [u8],
        src: &[u8],
        src_case: MemCase,
        dst_case: MemCase,
    ) -> ForgeResult<()> {
        if dst.len() != src.len() {
            return Err(internal_error!(
                "memcpy length mismatch: src {} bytes, dst {} bytes",
                src.len(),
                dst.len()
            ));
        }
        let kind = MemcpyKind::between(src_case, dst_case);
        tracing::trace!(
            device = %self.device,
            ?kind,
            bytes = src.len(),
            "sync_auto_memcpy"
        );
        dst.copy_from_slice(src);
        Ok(())
    }
}

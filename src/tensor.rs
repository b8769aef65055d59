//! Tensor model: shapes, dtypes, placement, and the tensor object itself
//!
//! A [`Tensor`] couples metadata (shape, dtype) with a placement kind and a
//! storage state. Mirrored tensors own their full data on a single device;
//! consistent tensors describe logical data laid out across a device group
//! by a [`ParallelDesc`] and a [`Distribute`] annotation. Storage is either
//! an eager blob object or a lazy graph value that has not materialized.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::blob::BlobObject;
use crate::device::{Device, DeviceTag};
use crate::error::{ForgeResult, TensorForgeError};
use crate::graph::ValueId;
use crate::shape_error;

/// Scalar element type of a tensor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I8,
    I32,
    I64,
    U8,
    Bool,
}

impl DType {
    /// Storage size of one element in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::I8 | DType::U8 | DType::Bool => 1,
        }
    }
}

/// Logical tensor shape as an ordered list of static extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    /// Scalar shape (rank 0, one element)
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements
    pub fn elem_cnt(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

/// Tensor metadata coupling shape and dtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMeta {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorMeta {
    pub fn new(shape: Shape, dtype: DType) -> Self {
        Self { shape, dtype }
    }

    /// Total byte length of a buffer holding this tensor
    pub fn byte_len(&self) -> usize {
        self.shape.elem_cnt() * self.dtype.size_in_bytes()
    }
}

/// Placement descriptor for a consistent tensor: the device group its
/// logical data is laid out across.
///
/// Deserialization funnels through [`ParallelDesc::new`], so an empty
/// ordinal list is rejected there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParallelDesc")]
pub struct ParallelDesc {
    device_tag: DeviceTag,
    ordinals: Vec<u32>,
}

#[derive(Deserialize)]
struct RawParallelDesc {
    device_tag: DeviceTag,
    ordinals: Vec<u32>,
}

impl TryFrom<RawParallelDesc> for ParallelDesc {
    type Error = TensorForgeError;

    fn try_from(raw: RawParallelDesc) -> ForgeResult<Self> {
        Self::new(raw.device_tag, raw.ordinals)
    }
}

impl ParallelDesc {
    pub fn new(device_tag: DeviceTag, ordinals: impl Into<Vec<u32>>) -> ForgeResult<Self> {
        let ordinals = ordinals.into();
        if ordinals.is_empty() {
            return Err(TensorForgeError::InvalidConfiguration(
                "parallel desc needs at least one device ordinal".to_string(),
            ));
        }
        Ok(Self {
            device_tag,
            ordinals,
        })
    }

    /// Single-device group on the host CPU
    pub fn cpu() -> Self {
        Self {
            device_tag: DeviceTag::Cpu,
            ordinals: vec![0],
        }
    }

    pub fn device_tag(&self) -> DeviceTag {
        self.device_tag
    }

    pub fn ordinals(&self) -> &[u32] {
        &self.ordinals
    }

    pub fn device_count(&self) -> usize {
        self.ordinals.len()
    }

    /// First device of the group. Eager consistent execution runs there;
    /// placement planning across the group belongs to the distributed
    /// layer, which is out of scope.
    pub fn primary_device(&self) -> Device {
        Device::new(self.device_tag, self.ordinals[0])
    }
}

/// How a consistent tensor's logical data maps onto its device group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribute {
    /// Full data replicated on every device
    Broadcast,
    /// Data split along the given axis
    Split { axis: usize },
    /// Each device holds a partial sum of the logical data
    PartialSum,
}

/// Placement kind of a tensor.
#[derive(Debug, Clone)]
pub enum TensorKind {
    /// Full data owned by a single device
    Mirrored { device: Device },
    /// Logical data distributed/replicated across a device group
    Consistent {
        parallel: ParallelDesc,
        distribute: Distribute,
    },
}

impl TensorKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TensorKind::Mirrored { .. } => "mirrored",
            TensorKind::Consistent { .. } => "consistent",
        }
    }
}

/// Storage state of a tensor.
#[derive(Clone)]
pub enum TensorStorage {
    /// Materialized blob object
    Eager(Arc<BlobObject>),
    /// Deferred graph value, no backing buffer yet
    Lazy(ValueId),
}

impl fmt::Debug for TensorStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorStorage::Eager(blob) => write!(f, "Eager({} bytes)", blob.byte_len()),
            TensorStorage::Lazy(id) => write!(f, "Lazy({:?})", id),
        }
    }
}

/// A tensor: metadata, placement kind, storage, and gradient flags.
///
/// A tensor owns exactly one blob object once materialized. Sharing a blob
/// between tensors happens only through explicit aliasing, never through
/// ordinary dispatch.
#[derive(Debug, Clone)]
pub struct Tensor {
    meta: TensorMeta,
    kind: TensorKind,
    storage: TensorStorage,
    requires_grad: bool,
    is_leaf: bool,
}

impl Tensor {
    /// Eager mirrored tensor backed by an existing blob object.
    ///
    /// The blob's own shape/dtype metadata is the source of truth.
    pub fn from_blob(blob: Arc<BlobObject>) -> Self {
        let meta = TensorMeta::new(blob.shape().clone(), blob.dtype());
        let device = blob.mem_case().device();
        Self {
            meta,
            kind: TensorKind::Mirrored { device },
            storage: TensorStorage::Eager(blob),
            requires_grad: false,
            is_leaf: true,
        }
    }

    /// Eager mirrored tensor allocated from shape/dtype/device, zero-filled.
    pub fn zeros(shape: Shape, dtype: DType, device: Device) -> ForgeResult<Self> {
        let blob = Arc::new(BlobObject::allocate(shape, dtype, device.mem_case())?);
        Ok(Self::from_blob(blob))
    }

    /// Eager mirrored tensor materialized from raw bytes.
    pub fn from_bytes(
        shape: Shape,
        dtype: DType,
        device: Device,
        bytes: Vec<u8>,
    ) -> ForgeResult<Self> {
        let blob = Arc::new(BlobObject::from_bytes(shape, dtype, device.mem_case(), bytes)?);
        Ok(Self::from_blob(blob))
    }

    /// Eager consistent tensor backed by an existing blob object.
    pub fn consistent_from_blob(
        blob: Arc<BlobObject>,
        parallel: ParallelDesc,
        distribute: Distribute,
    ) -> Self {
        let meta = TensorMeta::new(blob.shape().clone(), blob.dtype());
        Self {
            meta,
            kind: TensorKind::Consistent {
                parallel,
                distribute,
            },
            storage: TensorStorage::Eager(blob),
            requires_grad: false,
            is_leaf: true,
        }
    }

    /// Lazy tensor referencing a deferred graph value.
    pub fn lazy(meta: TensorMeta, kind: TensorKind, value: ValueId) -> Self {
        Self {
            meta,
            kind,
            storage: TensorStorage::Lazy(value),
            requires_grad: false,
            is_leaf: false,
        }
    }

    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    pub fn shape(&self) -> &Shape {
        &self.meta.shape
    }

    pub fn dtype(&self) -> DType {
        self.meta.dtype
    }

    pub fn kind(&self) -> &TensorKind {
        &self.kind
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.storage, TensorStorage::Lazy(_))
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(self.kind, TensorKind::Mirrored { .. })
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self.kind, TensorKind::Consistent { .. })
    }

    /// The owning device for a mirrored tensor, or the group's primary
    /// device for a consistent one.
    pub fn device(&self) -> Device {
        match &self.kind {
            TensorKind::Mirrored { device } => *device,
            TensorKind::Consistent { parallel, .. } => parallel.primary_device(),
        }
    }

    /// The materialized blob object, or a representation fault for lazy
    /// tensors.
    pub fn blob(&self) -> ForgeResult<&Arc<BlobObject>> {
        match &self.storage {
            TensorStorage::Eager(blob) => Ok(blob),
            TensorStorage::Lazy(id) => Err(TensorForgeError::NoMaterializedStorage(format!(
                "lazy value {:?}",
                id
            ))),
        }
    }

    /// The deferred graph value for a lazy tensor, if any
    pub fn lazy_value(&self) -> Option<ValueId> {
        match &self.storage {
            TensorStorage::Lazy(id) => Some(*id),
            TensorStorage::Eager(_) => None,
        }
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub(crate) fn mark_produced_by_op(&mut self) {
        self.is_leaf = false;
    }

    /// Snapshot of the tensor's bytes (eager tensors only)
    pub fn to_bytes(&self) -> ForgeResult<Vec<u8>> {
        self.blob()?.to_vec()
    }

    /// Validate that `bytes` matches this tensor's byte length
    pub fn check_byte_len(&self, bytes: &[u8]) -> ForgeResult<()> {
        let expected = self.meta.byte_len();
        if bytes.len() != expected {
            return Err(shape_error!(
                "tensor of shape {} ({} bytes) given {} bytes",
                self.meta.shape,
                expected,
                bytes.len()
            ));
        }
        Ok(())
    }
}

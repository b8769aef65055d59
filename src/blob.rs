//! Blob objects: device-resident data buffers plus placement metadata
//!
//! A [`BlobObject`] owns one fixed-size byte buffer together with its
//! shape, dtype, and memory case. The buffer is allocated once and never
//! reallocated behind a live reference; there is no resize API. Mutation
//! goes through `with_bytes_mut`, which is crate-private so only an
//! executing instruction's Compute phase can write.
//!
//! The buffer sits behind an `RwLock` so shared `Arc<BlobObject>` handles
//! stay safe, but the lock is uncontended in correct programs: the
//! dispatch layer's stream ordering guarantees a single writer at a time.

use std::sync::RwLock;

use crate::device::MemCase;
use crate::error::ForgeResult;
use crate::shape_error;
use crate::tensor::{DType, Shape, TensorMeta};

/// A device-resident data buffer with shape/dtype/placement metadata.
pub struct BlobObject {
    shape: Shape,
    dtype: DType,
    mem_case: MemCase,
    byte_len: usize,
    bytes: RwLock<Box<[u8]>>,
}

impl BlobObject {
    /// Allocate a zero-filled blob for `shape`/`dtype` in `mem_case`.
    pub fn allocate(shape: Shape, dtype: DType, mem_case: MemCase) -> ForgeResult<Self> {
        let byte_len = shape.elem_cnt() * dtype.size_in_bytes();
        tracing::trace!(%mem_case, byte_len, "allocating blob");
        Ok(Self {
            shape,
            dtype,
            mem_case,
            byte_len,
            bytes: RwLock::new(vec![0u8; byte_len].into_boxed_slice()),
        })
    }

    /// Materialize a blob from existing bytes.
    ///
    /// `bytes.len()` must match the byte length implied by shape and
    /// dtype; a mismatch is rejected before the buffer is adopted.
    pub fn from_bytes(
        shape: Shape,
        dtype: DType,
        mem_case: MemCase,
        bytes: Vec<u8>,
    ) -> ForgeResult<Self> {
        let byte_len = shape.elem_cnt() * dtype.size_in_bytes();
        if bytes.len() != byte_len {
            return Err(shape_error!(
                "blob of shape {} needs {} bytes, got {}",
                shape,
                byte_len,
                bytes.len()
            ));
        }
        Ok(Self {
            shape,
            dtype,
            mem_case,
            byte_len,
            bytes: RwLock::new(bytes.into_boxed_slice()),
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn mem_case(&self) -> MemCase {
        self.mem_case
    }

    /// Byte size of the blob body. Fixed for the blob's lifetime.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn meta(&self) -> TensorMeta {
        TensorMeta::new(self.shape.clone(), self.dtype)
    }

    /// Read-only access to the buffer contents.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> ForgeResult<R> {
        let guard = self.bytes.read()?;
        Ok(f(&guard))
    }

    /// Mutable access to the buffer contents.
    ///
    /// Crate-private: the sole legitimate mutator of a blob is the
    /// instruction currently executing Compute against it as an output
    /// operand.
    pub(crate) fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> ForgeResult<R> {
        let mut guard = self.bytes.write()?;
        Ok(f(&mut guard))
    }

    /// Snapshot of the buffer contents.
    pub fn to_vec(&self) -> ForgeResult<Vec<u8>> {
        self.with_bytes(|b| b.to_vec())
    }
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("mem_case", &self.mem_case)
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;

    #[test]
    fn test_allocate_zero_filled() {
        let blob = BlobObject::allocate(Shape::new([2, 2]), DType::F32, MemCase::Host).unwrap();
        assert_eq!(blob.byte_len(), 16);
        assert_eq!(blob.to_vec().unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let blob = BlobObject::from_bytes(
            Shape::new([4]),
            DType::U8,
            Device::accel(0).mem_case(),
            vec![9, 8, 7, 6],
        )
        .unwrap();
        assert_eq!(blob.mem_case(), MemCase::Device { ordinal: 0 });
        assert_eq!(blob.to_vec().unwrap(), vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_from_bytes_rejects_size_mismatch() {
        let result =
            BlobObject::from_bytes(Shape::new([4]), DType::F32, MemCase::Host, vec![0u8; 4]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mutation_visible_to_readers() {
        let blob = BlobObject::allocate(Shape::new([4]), DType::U8, MemCase::Host).unwrap();
        blob.with_bytes_mut(|b| b.copy_from_slice(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(blob.to_vec().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_element_blob() {
        let blob = BlobObject::allocate(Shape::new([0]), DType::F32, MemCase::Host).unwrap();
        assert_eq!(blob.byte_len(), 0);
        assert!(blob.to_vec().unwrap().is_empty());
    }
}

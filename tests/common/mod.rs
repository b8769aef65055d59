//! Shared helpers for integration tests

use std::sync::Arc;

use tensorforge::{AttrMap, AttrValue, BlobObject, DType, Device, Shape, Tensor};

#[allow(dead_code)]
pub fn u8_tensor(device: Device, bytes: Vec<u8>) -> Tensor {
    Tensor::from_bytes(Shape::new([bytes.len()]), DType::U8, device, bytes)
        .expect("byte length matches shape")
}

#[allow(dead_code)]
pub fn u8_blob(device: Device, bytes: Vec<u8>) -> Arc<BlobObject> {
    Arc::new(
        BlobObject::from_bytes(Shape::new([bytes.len()]), DType::U8, device.mem_case(), bytes)
            .expect("byte length matches shape"),
    )
}

#[allow(dead_code)]
pub fn copy_attrs(dst: Device) -> AttrMap {
    AttrMap::new().with("device", AttrValue::Device(dst))
}

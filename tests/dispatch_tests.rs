//! Dispatch façade integration tests

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use serial_test::serial;

use common::{copy_attrs, u8_tensor};
use tensorforge::{
    default_session, dispatch, dispatch_single, dispatch_with_session,
    sync_access_blob_by_callback, AttrMap, BlobAccess, DType, Device, ForgeResult, OpExpr,
    Session, Shape, Tensor, TensorForgeError, TensorMeta,
};

#[test]
fn test_copy_between_accel_ordinals() -> anyhow::Result<()> {
    let session = Session::new();
    let op = OpExpr::copy("copy_01");
    let input = u8_tensor(Device::accel(0), vec![1, 2, 3, 4]);

    let out = dispatch_single(&session, &op, &[input.clone()], &copy_attrs(Device::accel(1)))?;
    assert_eq!(out.device(), Device::accel(1));
    assert_eq!(out.to_bytes()?, vec![1, 2, 3, 4]);
    // Source tensor keeps its bytes and its placement
    assert_eq!(input.to_bytes()?, vec![1, 2, 3, 4]);
    assert_eq!(input.device(), Device::accel(0));
    Ok(())
}

#[test]
fn test_output_arity_matches_declaration() {
    fn fan_out_infer(inputs: &[TensorMeta], _attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
        Ok(vec![inputs[0].clone(), inputs[0].clone()])
    }
    let session = Session::new();
    session.set_eager_execution(false);
    let op = OpExpr::new(
        "split_0",
        "split",
        vec!["in_0".to_string()],
        vec!["out_0".to_string(), "out_1".to_string()],
        fan_out_infer,
    );

    let outputs = dispatch_with_session(
        &session,
        &op,
        &[u8_tensor(Device::cpu(), vec![1, 2])],
        &AttrMap::new(),
    )
    .unwrap();
    // Every declared output slot holds a real tensor
    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(Tensor::is_lazy));
}

#[test]
fn test_zero_output_op_through_lazy_dispatch() {
    fn sink_infer(_inputs: &[TensorMeta], _attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
        Ok(Vec::new())
    }
    let session = Session::new();
    session.set_eager_execution(false);
    let op = OpExpr::new(
        "sink_0",
        "sink",
        vec!["in_0".to_string()],
        Vec::new(),
        sink_infer,
    );

    let outputs = dispatch_with_session(
        &session,
        &op,
        &[u8_tensor(Device::cpu(), vec![1, 2])],
        &AttrMap::new(),
    )
    .unwrap();
    // Declared zero outputs: an empty vector, and the node still recorded
    assert!(outputs.is_empty());
    assert_eq!(session.with_graph(|g| g.node_count()).unwrap(), 1);
}

#[test]
fn test_zero_input_op_through_lazy_dispatch() {
    fn source_infer(_inputs: &[TensorMeta], _attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
        Ok(vec![TensorMeta::new(Shape::new([3]), DType::F32)])
    }
    let session = Session::new();
    session.set_eager_execution(false);
    let op = OpExpr::new(
        "source_0",
        "source",
        Vec::new(),
        vec!["out_0".to_string()],
        source_infer,
    );

    let outputs = dispatch_with_session(&session, &op, &[], &AttrMap::new()).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].meta().shape, Shape::new([3]));
}

#[test]
fn test_two_input_op_through_lazy_dispatch() {
    fn add_infer(inputs: &[TensorMeta], _attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
        Ok(vec![inputs[0].clone()])
    }
    let session = Session::new();
    session.set_eager_execution(false);
    let op = OpExpr::new(
        "add_0",
        "add",
        vec!["in_0".to_string(), "in_1".to_string()],
        vec!["out_0".to_string()],
        add_infer,
    );

    let a = u8_tensor(Device::cpu(), vec![1, 2]);
    let b = u8_tensor(Device::cpu(), vec![3, 4]);
    let outputs = dispatch_with_session(&session, &op, &[a, b], &AttrMap::new()).unwrap();
    assert_eq!(outputs.len(), 1);
    session
        .with_graph(|g| assert_eq!(g.nodes()[0].inputs.len(), 2))
        .unwrap();
}

#[test]
fn test_arity_mismatch_faults_before_any_effect() {
    let session = Session::new();
    session.set_eager_execution(false);
    let op = OpExpr::copy("copy_a");

    let err = dispatch_with_session(&session, &op, &[], &AttrMap::new()).unwrap_err();
    assert!(matches!(
        err,
        TensorForgeError::InputArityMismatch {
            expected: 1,
            actual: 0,
            ..
        }
    ));
    // Nothing was recorded
    assert_eq!(session.with_graph(|g| g.node_count()).unwrap(), 0);
}

#[test]
fn test_grad_tracking_flows_through_dispatch() {
    let session = Session::new();
    let op = OpExpr::copy("copy_g");
    let mut input = u8_tensor(Device::cpu(), vec![5]);
    input.set_requires_grad(true);

    let out = dispatch_single(&session, &op, &[input], &copy_attrs(Device::accel(0))).unwrap();
    assert!(out.requires_grad());
    assert!(!out.is_leaf());
}

#[test]
#[serial]
fn test_default_session_dispatch() {
    let session = default_session();
    session.set_eager_execution(true);
    let op = OpExpr::copy("copy_default");

    let outputs = dispatch(
        &op,
        &[u8_tensor(Device::cpu(), vec![6, 7])],
        &copy_attrs(Device::accel(0)),
    )
    .unwrap();
    assert_eq!(outputs[0].to_bytes().unwrap(), vec![6, 7]);
}

#[test]
fn test_callback_access_after_copy_sees_copied_bytes() {
    let session = Session::new();
    let op = OpExpr::copy("copy_cb");
    let out = dispatch_single(
        &session,
        &op,
        &[u8_tensor(Device::cpu(), vec![8, 9])],
        &copy_attrs(Device::accel(1)),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    sync_access_blob_by_callback(
        &out,
        BlobAccess::Read(Arc::new(move |bytes: &[u8]| {
            sink.lock().unwrap().extend_from_slice(bytes);
        })),
    )
    .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![8, 9]);
}

//! Interpreter selection integration tests
//!
//! Selection is a pure function of the session's flags at call time, so
//! each case asserts both the chosen mode and that re-selection after a
//! flag flip lands somewhere else.

mod common;

use serial_test::serial;

use common::{copy_attrs, u8_tensor};
use tensorforge::{
    default_session, dispatch_single, interpreter_for, Device, InterpreterMode, OpExpr, Session,
};

#[test]
fn test_lazy_when_eager_disabled() {
    let session = Session::new();
    session.set_eager_execution(false);
    // Strategy flags are irrelevant once eager is off
    session.push_mirrored_strategy(true).unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::Lazy
    );
    session.pop_mirrored_strategy().unwrap();
    session.push_mirrored_strategy(false).unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::Lazy
    );
}

#[test]
fn test_eager_defaults_to_mirrored_with_empty_stack() {
    let session = Session::new();
    assert!(session.mirrored_strategy_stack_empty().unwrap());
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::EagerMirrored
    );
}

#[test]
fn test_eager_consistent_only_in_explicit_region() {
    let session = Session::new();
    session.push_mirrored_strategy(false).unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::EagerConsistent
    );

    // Nested mirrored region shadows the consistent one
    session.push_mirrored_strategy(true).unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::EagerMirrored
    );

    session.pop_mirrored_strategy().unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::EagerConsistent
    );
    session.pop_mirrored_strategy().unwrap();
    assert_eq!(
        interpreter_for(&session).unwrap().mode(),
        InterpreterMode::EagerMirrored
    );
}

#[test]
fn test_identical_flags_select_identical_interpreters() {
    let session = Session::new();
    let first = interpreter_for(&session).unwrap().mode();
    let second = interpreter_for(&session).unwrap().mode();
    assert_eq!(first, second);
}

#[test]
fn test_flag_flip_between_calls_changes_execution() {
    let session = Session::new();
    let op = OpExpr::copy("copy_s");

    // Eager call materializes immediately
    let eager_out = dispatch_single(
        &session,
        &op,
        &[u8_tensor(Device::cpu(), vec![1, 2])],
        &copy_attrs(Device::accel(0)),
    )
    .unwrap();
    assert!(!eager_out.is_lazy());

    // Same call after the flip only records
    session.set_eager_execution(false);
    let lazy_out = dispatch_single(
        &session,
        &op,
        &[u8_tensor(Device::cpu(), vec![1, 2])],
        &copy_attrs(Device::accel(0)),
    )
    .unwrap();
    assert!(lazy_out.is_lazy());
    assert_eq!(session.with_graph(|g| g.node_count()).unwrap(), 1);
}

#[test]
#[serial]
fn test_default_session_selection_follows_flags() {
    let session = default_session();
    session.set_eager_execution(true);
    assert_eq!(
        interpreter_for(session).unwrap().mode(),
        InterpreterMode::EagerMirrored
    );
    session.set_eager_execution(false);
    assert_eq!(
        interpreter_for(session).unwrap().mode(),
        InterpreterMode::Lazy
    );
    session.set_eager_execution(true);
}

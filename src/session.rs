//! Session state
//!
//! The session carries every flag that steers interpreter selection: the
//! eager-execution switch, the mirrored-strategy stack, the scope stack,
//! and the deferred-execution graph lazy dispatch records into. Selection
//! reads these flags fresh on every call, so flipping a flag between two
//! calls changes where the second call runs.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::ForgeResult;
use crate::graph::LazyGraph;
use crate::scope::Scope;

/// Per-session execution state.
pub struct Session {
    eager_execution: AtomicBool,
    mirrored_stack: Mutex<Vec<bool>>,
    scope_stack: Mutex<Vec<Scope>>,
    graph: Mutex<LazyGraph>,
}

impl Session {
    /// New session with eager execution enabled, empty strategy and scope
    /// stacks, and an empty graph.
    pub fn new() -> Self {
        Self {
            eager_execution: AtomicBool::new(true),
            mirrored_stack: Mutex::new(Vec::new()),
            scope_stack: Mutex::new(Vec::new()),
            graph: Mutex::new(LazyGraph::new()),
        }
    }

    pub fn eager_execution_enabled(&self) -> bool {
        self.eager_execution.load(Ordering::Acquire)
    }

    pub fn set_eager_execution(&self, enabled: bool) {
        tracing::debug!(enabled, "eager execution switched");
        self.eager_execution.store(enabled, Ordering::Release);
    }

    /// Enter a mirrored-strategy region. `enabled = false` marks an
    /// explicitly consistent region.
    pub fn push_mirrored_strategy(&self, enabled: bool) -> ForgeResult<()> {
        self.mirrored_stack.lock()?.push(enabled);
        Ok(())
    }

    /// Leave the innermost strategy region. Popping an empty stack is a
    /// caller bug but harmless, so it is ignored.
    pub fn pop_mirrored_strategy(&self) -> ForgeResult<()> {
        self.mirrored_stack.lock()?.pop();
        Ok(())
    }

    pub fn mirrored_strategy_stack_empty(&self) -> ForgeResult<bool> {
        Ok(self.mirrored_stack.lock()?.is_empty())
    }

    /// Whether the innermost strategy region is mirrored. With no region
    /// entered, placement defaults to mirrored.
    pub fn is_mirrored_strategy_enabled(&self) -> ForgeResult<bool> {
        Ok(self.mirrored_stack.lock()?.last().copied().unwrap_or(true))
    }

    pub fn push_scope(&self, scope: Scope) -> ForgeResult<()> {
        self.scope_stack.lock()?.push(scope);
        Ok(())
    }

    pub fn pop_scope(&self) -> ForgeResult<()> {
        self.scope_stack.lock()?.pop();
        Ok(())
    }

    /// The innermost scope, or the root scope when none was pushed.
    pub fn current_scope(&self) -> ForgeResult<Scope> {
        Ok(self.scope_stack.lock()?.last().cloned().unwrap_or_default())
    }

    /// Run `f` against the session's deferred-execution graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut LazyGraph) -> R) -> ForgeResult<R> {
        let mut graph = self.graph.lock()?;
        Ok(f(&mut graph))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_SESSION: Lazy<Session> = Lazy::new(Session::new);

/// The process-wide default session.
pub fn default_session() -> &'static Session {
    &DEFAULT_SESSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceTag;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new();
        assert!(session.eager_execution_enabled());
        assert!(session.mirrored_strategy_stack_empty().unwrap());
        assert!(session.is_mirrored_strategy_enabled().unwrap());
        assert_eq!(session.current_scope().unwrap().symbol_id(), 0);
    }

    #[test]
    fn test_mirrored_stack_tracks_innermost_region() {
        let session = Session::new();
        session.push_mirrored_strategy(true).unwrap();
        session.push_mirrored_strategy(false).unwrap();
        assert!(!session.is_mirrored_strategy_enabled().unwrap());
        assert!(!session.mirrored_strategy_stack_empty().unwrap());

        session.pop_mirrored_strategy().unwrap();
        assert!(session.is_mirrored_strategy_enabled().unwrap());
        session.pop_mirrored_strategy().unwrap();
        assert!(session.mirrored_strategy_stack_empty().unwrap());
        // Extra pop is ignored
        session.pop_mirrored_strategy().unwrap();
    }

    #[test]
    fn test_scope_stack_shadows_root() {
        let session = Session::new();
        let inner = Scope::root().with_device_tag(3, DeviceTag::Accel);
        session.push_scope(inner).unwrap();
        assert_eq!(session.current_scope().unwrap().symbol_id(), 3);
        session.pop_scope().unwrap();
        assert_eq!(session.current_scope().unwrap().symbol_id(), 0);
    }

    #[test]
    fn test_eager_flag_round_trip() {
        let session = Session::new();
        session.set_eager_execution(false);
        assert!(!session.eager_execution_enabled());
        session.set_eager_execution(true);
        assert!(session.eager_execution_enabled());
    }

    #[test]
    fn test_graph_is_per_session() {
        let a = Session::new();
        let b = Session::new();
        a.with_graph(|g| {
            g.intern_input(&crate::tensor::TensorMeta::new(
                crate::tensor::Shape::scalar(),
                crate::tensor::DType::F32,
            ))
        })
        .unwrap();
        assert_eq!(b.with_graph(|g| g.node_count()).unwrap(), 0);
    }
}

//! Process-wide instruction type registry
//!
//! Maps a (domain tag, operation name, stream kind) key to a registered
//! [`InstructionType`] singleton. Builtin instruction families register
//! when the global registry is first touched; external families may
//! register additional keys before their first dispatch. Duplicate keys
//! are a fatal configuration fault. Once registration has settled,
//! lookups only take a read lock and are safe from any dispatch path.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::device::{DeviceTag, StreamKind};
use crate::error::{ForgeResult, TensorForgeError};
use crate::vm::{callback, copy, reference, InstructionType};

/// Registry key: domain tag, logical operation name, stream kind.
///
/// The domain tag names the device family the operation's *source* data
/// lives on; the stream kind names the queue family that executes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrTypeKey {
    domain: DeviceTag,
    op_name: String,
    stream_kind: StreamKind,
}

impl InstrTypeKey {
    pub fn new(domain: DeviceTag, op_name: impl Into<String>, stream_kind: StreamKind) -> Self {
        Self {
            domain,
            op_name: op_name.into(),
            stream_kind,
        }
    }

    pub fn domain(&self) -> DeviceTag {
        self.domain
    }

    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.stream_kind
    }
}

impl fmt::Display for InstrTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.domain, self.stream_kind, self.op_name)
    }
}

/// Table of registered instruction types.
///
/// Constructible for tests; production code goes through the process-wide
/// instance returned by [`global_registry`].
pub struct InstructionTypeRegistry {
    table: RwLock<HashMap<InstrTypeKey, Arc<dyn InstructionType>>>,
}

impl InstructionTypeRegistry {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Add a singleton instruction type under `key`.
    ///
    /// Registration order does not matter; keys must be unique. A
    /// duplicate key is a configuration fault.
    pub fn register(
        &self,
        key: InstrTypeKey,
        instr_type: Arc<dyn InstructionType>,
    ) -> ForgeResult<()> {
        let mut table = self.table.write()?;
        if table.contains_key(&key) {
            return Err(TensorForgeError::DuplicateInstructionType(key.to_string()));
        }
        tracing::debug!(key = %key, "registered instruction type");
        table.insert(key, instr_type);
        Ok(())
    }

    /// Resolve the instruction type registered under `key`.
    pub fn lookup(&self, key: &InstrTypeKey) -> ForgeResult<Arc<dyn InstructionType>> {
        let table = self.table.read()?;
        table
            .get(key)
            .cloned()
            .ok_or_else(|| TensorForgeError::InstructionTypeNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &InstrTypeKey) -> ForgeResult<bool> {
        Ok(self.table.read()?.contains_key(key))
    }

    pub fn len(&self) -> ForgeResult<usize> {
        Ok(self.table.read()?.len())
    }

    pub fn is_empty(&self) -> ForgeResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InstructionTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the builtin instruction families.
pub(crate) fn register_builtins(registry: &InstructionTypeRegistry) -> ForgeResult<()> {
    copy::register(registry)?;
    callback::register(registry)?;
    reference::register(registry)?;
    Ok(())
}

static GLOBAL_REGISTRY: Lazy<InstructionTypeRegistry> = Lazy::new(|| {
    let registry = InstructionTypeRegistry::new();
    register_builtins(&registry).expect("builtin instruction type registration must not conflict");
    registry
});

/// The process-wide registry, with builtins registered on first access.
pub fn global_registry() -> &'static InstructionTypeRegistry {
    &GLOBAL_REGISTRY
}

/// Register an instruction type in the process-wide registry.
///
/// # Panics
/// Panics on a duplicate key: duplicate registration indicates an
/// unrecoverable programming error and is intentionally fatal.
pub fn register_instruction_type(key: InstrTypeKey, instr_type: Arc<dyn InstructionType>) {
    if let Err(err) = global_registry().register(key, instr_type) {
        panic!("{}", err);
    }
}

/// Look up an instruction type in the process-wide registry.
pub fn lookup_instruction_type(key: &InstrTypeKey) -> ForgeResult<Arc<dyn InstructionType>> {
    global_registry().lookup(key)
}

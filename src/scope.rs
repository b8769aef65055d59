//! Placement scopes
//!
//! A scope supplies the defaults an operation request does not carry
//! itself: the device family to place on, the process group for
//! consistent placement, and the symbol id recorded into generated
//! operator configurations.

use crate::device::DeviceTag;
use crate::tensor::ParallelDesc;

/// Defaults applied when completing an operator configuration.
#[derive(Debug, Clone)]
pub struct Scope {
    symbol_id: i64,
    device_tag: DeviceTag,
    parallel: ParallelDesc,
}

impl Scope {
    pub fn new(symbol_id: i64, device_tag: DeviceTag, parallel: ParallelDesc) -> Self {
        Self {
            symbol_id,
            device_tag,
            parallel,
        }
    }

    /// Root scope: CPU placement over the single-member local group.
    pub fn root() -> Self {
        Self::new(0, DeviceTag::Cpu, ParallelDesc::cpu())
    }

    pub fn symbol_id(&self) -> i64 {
        self.symbol_id
    }

    pub fn device_tag(&self) -> DeviceTag {
        self.device_tag
    }

    pub fn parallel_desc(&self) -> &ParallelDesc {
        &self.parallel
    }

    /// Derived scope with a different device family, same group shape.
    pub fn with_device_tag(&self, symbol_id: i64, device_tag: DeviceTag) -> Self {
        Self::new(symbol_id, device_tag, self.parallel.clone())
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::root()
    }
}

//! Logical operation expressions and attribute maps
//!
//! An [`OpExpr`] describes one logical operation: its instance name, the
//! logical operation name dispatch resolves instruction types with, its
//! declared input/output argument names (and therefore arities), and the
//! rule that infers output metadata from input metadata. The attribute
//! map attached to each call is an immutable key-value bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::{Device, DeviceTag};
use crate::error::ForgeResult;
use crate::internal_error;
use crate::tensor::{DType, Shape, TensorMeta};

/// One attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Shape(Shape),
    DType(DType),
    Device(Device),
}

/// Immutable key-value attribute map attached to an operation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrMap {
    entries: BTreeMap<String, AttrValue>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(AttrValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(AttrValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(AttrValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_device(&self, key: &str) -> Option<Device> {
        match self.get(key) {
            Some(AttrValue::Device(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rule inferring output metadata from input metadata and attributes.
pub type InferFn = fn(&[TensorMeta], &AttrMap) -> ForgeResult<Vec<TensorMeta>>;

/// A logical operation expression.
pub struct OpExpr {
    name: String,
    op_name: String,
    input_bns: Vec<String>,
    output_bns: Vec<String>,
    infer_fn: InferFn,
}

impl OpExpr {
    pub fn new(
        name: impl Into<String>,
        op_name: impl Into<String>,
        input_bns: Vec<String>,
        output_bns: Vec<String>,
        infer_fn: InferFn,
    ) -> Self {
        Self {
            name: name.into(),
            op_name: op_name.into(),
            input_bns,
            output_bns,
            infer_fn,
        }
    }

    /// The builtin cross-device copy operation: one input, one output,
    /// output metadata identical to the input's.
    pub fn copy(name: impl Into<String>) -> Self {
        Self::new(
            name,
            "copy",
            vec!["in_0".to_string()],
            vec!["out_0".to_string()],
            identity_infer,
        )
    }

    /// Instance name of this operation call
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical operation name used for instruction-type resolution
    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    /// Declared input argument names, in positional order
    pub fn indexed_ibns(&self) -> &[String] {
        &self.input_bns
    }

    /// Declared output argument names, in positional order
    pub fn indexed_obns(&self) -> &[String] {
        &self.output_bns
    }

    pub fn input_size(&self) -> usize {
        self.input_bns.len()
    }

    pub fn output_size(&self) -> usize {
        self.output_bns.len()
    }

    /// Run the operation's metadata inference rule.
    ///
    /// The returned vector's length must equal the declared output arity;
    /// a rule violating that is a bug and reported as an internal fault.
    pub fn infer(&self, inputs: &[TensorMeta], attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
        let metas = (self.infer_fn)(inputs, attrs)?;
        if metas.len() != self.output_size() {
            return Err(internal_error!(
                "op '{}' inference produced {} outputs, declared {}",
                self.name,
                metas.len(),
                self.output_size()
            ));
        }
        Ok(metas)
    }

    /// Generate the operator configuration dispatch completes against the
    /// current scope (unset device tag filled from scope defaults).
    pub fn gen_op_conf(&self, attrs: &AttrMap) -> OpConf {
        OpConf {
            name: self.name.clone(),
            device_tag: attrs.get_device("device").map(|d| d.tag()),
            scope_symbol_id: None,
            attrs: attrs.clone(),
        }
    }
}

impl std::fmt::Debug for OpExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpExpr")
            .field("name", &self.name)
            .field("op_name", &self.op_name)
            .field("inputs", &self.input_bns)
            .field("outputs", &self.output_bns)
            .finish()
    }
}

/// Operator configuration: the scope-completed form of one op call.
#[derive(Debug, Clone)]
pub struct OpConf {
    pub name: String,
    pub device_tag: Option<DeviceTag>,
    pub scope_symbol_id: Option<i64>,
    pub attrs: AttrMap,
}

/// Output metadata equals the single input's metadata.
pub fn identity_infer(inputs: &[TensorMeta], _attrs: &AttrMap) -> ForgeResult<Vec<TensorMeta>> {
    match inputs {
        [meta] => Ok(vec![meta.clone()]),
        _ => Err(internal_error!(
            "identity inference expects exactly 1 input, got {}",
            inputs.len()
        )),
    }
}

//! Deferred-execution graph
//!
//! Lazy dispatch records operations here instead of executing them. The
//! graph is an append-only arena of nodes; every tensor value a node
//! produces (and every externally-supplied input) gets a fresh
//! [`ValueId`]. Inference runs at record time, so a recorded node always
//! carries fully inferred output metadata even though no bytes exist yet.

use serde::{Deserialize, Serialize};

use crate::error::ForgeResult;
use crate::op::{OpConf, OpExpr};
use crate::tensor::TensorMeta;

/// Identifier of one deferred tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(u64);

impl ValueId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One recorded operation.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    pub op_name: String,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub output_metas: Vec<TensorMeta>,
    /// True when recorded under mirrored placement, false for consistent
    pub mirrored: bool,
}

/// Inference result handed back to the recording dispatcher.
#[derive(Debug, Clone)]
pub struct InferredOpAttribute {
    pub output_values: Vec<ValueId>,
    pub output_metas: Vec<TensorMeta>,
}

/// Append-only operation graph with a private value-id counter.
#[derive(Debug, Default)]
pub struct LazyGraph {
    nodes: Vec<GraphNode>,
    next_value: u64,
}

impl LazyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_value(&mut self) -> ValueId {
        let id = ValueId::new(self.next_value);
        self.next_value += 1;
        id
    }

    /// Assign a value id to an externally-supplied input tensor.
    pub fn intern_input(&mut self, _meta: &TensorMeta) -> ValueId {
        self.fresh_value()
    }

    /// Record an operation under mirrored placement.
    pub fn add_and_infer_mirrored_op(
        &mut self,
        conf: &OpConf,
        op: &OpExpr,
        input_metas: &[TensorMeta],
        input_values: Vec<ValueId>,
    ) -> ForgeResult<InferredOpAttribute> {
        self.add_and_infer(conf, op, input_metas, input_values, true)
    }

    /// Record an operation under consistent placement.
    pub fn add_and_infer_consistent_op(
        &mut self,
        conf: &OpConf,
        op: &OpExpr,
        input_metas: &[TensorMeta],
        input_values: Vec<ValueId>,
    ) -> ForgeResult<InferredOpAttribute> {
        self.add_and_infer(conf, op, input_metas, input_values, false)
    }

    fn add_and_infer(
        &mut self,
        conf: &OpConf,
        op: &OpExpr,
        input_metas: &[TensorMeta],
        input_values: Vec<ValueId>,
        mirrored: bool,
    ) -> ForgeResult<InferredOpAttribute> {
        let output_metas = op.infer(input_metas, &conf.attrs)?;
        let output_values: Vec<ValueId> =
            (0..output_metas.len()).map(|_| self.fresh_value()).collect();

        tracing::debug!(
            op = conf.name.as_str(),
            inputs = input_values.len(),
            outputs = output_values.len(),
            mirrored,
            "recorded graph node"
        );
        self.nodes.push(GraphNode {
            name: conf.name.clone(),
            op_name: op.op_name().to_string(),
            inputs: input_values,
            outputs: output_values.clone(),
            output_metas: output_metas.clone(),
            mirrored,
        });

        Ok(InferredOpAttribute {
            output_values,
            output_metas,
        })
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Metadata of a recorded value, if some node produces it.
    pub fn meta_of(&self, value: ValueId) -> Option<&TensorMeta> {
        self.nodes.iter().find_map(|node| {
            node.outputs
                .iter()
                .position(|v| *v == value)
                .map(|i| &node.output_metas[i])
        })
    }
}

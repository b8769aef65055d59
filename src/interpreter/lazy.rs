//! Lazy interpreter
//!
//! Lazy dispatch records operations into the session's graph instead of
//! executing them. The operator configuration is completed against the
//! current scope first (scope symbol id, default device family), then the
//! node is recorded with inference run at record time. Outputs come back
//! as lazy tensors referencing the recorded graph values.

use crate::device::Device;
use crate::error::ForgeResult;
use crate::op::{AttrMap, OpExpr};
use crate::session::Session;
use crate::tensor::{Distribute, Tensor, TensorKind};

use super::{InterpreterMode, OpInterpreter};

pub struct LazyInterpreter;

impl OpInterpreter for LazyInterpreter {
    fn mode(&self) -> InterpreterMode {
        InterpreterMode::Lazy
    }

    fn apply(
        &self,
        session: &Session,
        op: &OpExpr,
        inputs: &[Tensor],
        attrs: &AttrMap,
    ) -> ForgeResult<Vec<Tensor>> {
        let scope = session.current_scope()?;
        let mut conf = op.gen_op_conf(attrs);
        conf.scope_symbol_id = Some(scope.symbol_id());
        if conf.device_tag.is_none() {
            conf.device_tag = Some(scope.device_tag());
        }

        // Same placement rule eager selection uses: no strategy region
        // entered, or an explicitly mirrored one, records mirrored nodes.
        let mirrored = session.mirrored_strategy_stack_empty()?
            || session.is_mirrored_strategy_enabled()?;

        let input_metas: Vec<_> = inputs.iter().map(|t| t.meta().clone()).collect();
        let inferred = session.with_graph(|graph| {
            let input_values = inputs
                .iter()
                .map(|t| {
                    t.lazy_value()
                        .unwrap_or_else(|| graph.intern_input(t.meta()))
                })
                .collect();
            if mirrored {
                graph.add_and_infer_mirrored_op(&conf, op, &input_metas, input_values)
            } else {
                graph.add_and_infer_consistent_op(&conf, op, &input_metas, input_values)
            }
        })??;

        let outputs = inferred
            .output_metas
            .into_iter()
            .zip(inferred.output_values)
            .map(|(meta, value)| {
                let kind = if mirrored {
                    TensorKind::Mirrored {
                        device: attrs
                            .get_device("device")
                            .unwrap_or_else(|| Device::new(scope.device_tag(), 0)),
                    }
                } else {
                    TensorKind::Consistent {
                        parallel: scope.parallel_desc().clone(),
                        distribute: Distribute::Broadcast,
                    }
                };
                Tensor::lazy(meta, kind, value)
            })
            .collect();
        Ok(outputs)
    }
}

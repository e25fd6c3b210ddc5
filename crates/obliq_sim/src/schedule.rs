//! Builds the fixed topological execution order for one step's algebraic
//! phase.
//!
//! A stateful `transfer_function`'s algebraic output depends only on its own
//! continuous state, never on its current-step input (`obliq_blocks::step`
//! reads the input value only for its shape, when it needs one at all) — so
//! the wire driving its input is not a scheduling dependency. This is what
//! lets a feedback loop close through an integrator without being a cycle.
//! Any cycle that survives after dropping those edges is a genuine algebraic
//! loop; it is broken by discarding one arbitrary incoming edge of a node on
//! the cycle, with a warning recorded for the caller.

use std::collections::HashMap;

use obliq_diagnostics::{codes, Diagnostic, DiagnosticSink};
use obliq_ir::{BlockId, BlockKind, Sheet};
use obliq_source::Span;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Computes a stable topological block order for `sheet`'s algebraic phase,
/// emitting an `ALGEBRAIC_LOOP` warning into `sink` for every loop it has to
/// break arbitrarily.
pub fn build_schedule(sheet: &Sheet, sink: &DiagnosticSink) -> Vec<BlockId> {
    let mut graph = DiGraph::<BlockId, ()>::new();
    let mut nodes: HashMap<BlockId, NodeIndex> = HashMap::with_capacity(sheet.blocks.len());
    for (block_id, _) in sheet.blocks.iter() {
        nodes.insert(block_id, graph.add_node(block_id));
    }

    for wire in &sheet.wires {
        if breaks_loop_by_state(sheet, wire.target_port.block) {
            continue;
        }
        let source = nodes[&wire.source_port.block];
        let target = nodes[&wire.target_port.block];
        graph.add_edge(source, target, ());
    }

    loop {
        match toposort(&graph, None) {
            Ok(order) => return order.into_iter().map(|n| graph[n]).collect(),
            Err(cycle) => {
                let stuck = cycle.node_id();
                let block_id = graph[stuck];
                let incoming = graph.edges_directed(stuck, Direction::Incoming).next().map(|e| e.id());
                if let Some(edge) = incoming {
                    graph.remove_edge(edge);
                } else {
                    // No incoming edge at all but toposort still rejected the
                    // graph: a self-loop on `stuck`. Drop any edge at it.
                    if let Some(edge) = graph.edges_directed(stuck, Direction::Outgoing).next().map(|e| e.id()) {
                        graph.remove_edge(edge);
                    } else {
                        break order_fallback(&graph);
                    }
                }
                sink.emit(Diagnostic::warning(
                    codes::ALGEBRAIC_LOOP,
                    format!(
                        "algebraic loop through block {block_id:?} has no continuous-state edge to \
                         break it on; broke it arbitrarily, reusing last step's output there"
                    ),
                    Span::DUMMY,
                ));
            }
        }
    }
}

/// `true` if `block_id` is a stateful `transfer_function`: its algebraic
/// output is a pure function of its own continuous state, so wires driving
/// its input are not scheduling dependencies.
fn breaks_loop_by_state(sheet: &Sheet, block_id: BlockId) -> bool {
    sheet
        .block(block_id)
        .map(|b| matches!(&b.kind, BlockKind::TransferFunction(p) if p.order() >= 1))
        .unwrap_or(false)
}

/// Defensive fallback if edge removal somehow never converges: every node in
/// whatever order the arena assigned them, rather than looping forever.
fn order_fallback(graph: &DiGraph<BlockId, ()>) -> Vec<BlockId> {
    graph.node_indices().map(|n| graph[n]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_common::Ident;
    use obliq_ir::{
        Arena, Block, Extents, Position, ScaleParams, SourceParams, SourceVariant,
        TransferFunctionParams, Wire, WireId,
    };
    use obliq_ir::{BaseType, SignalType};
    use obliq_source::Span;

    fn double() -> SignalType {
        SignalType::Scalar { base: BaseType::Double }
    }

    fn block(id: u32, kind: BlockKind) -> Block {
        Block {
            id: BlockId::from_raw(id),
            kind,
            name: Ident::from_raw(id),
            position: Position { x: 0.0, y: 0.0 },
            span: Span::DUMMY,
        }
    }

    fn sheet_from(blocks: Arena<BlockId, Block>, wires: Vec<Wire>) -> Sheet {
        Sheet {
            id: obliq_ir::SheetId::from_raw(0),
            name: Ident::from_raw(0),
            blocks,
            wires,
            extents: Extents::default(),
        }
    }

    #[test]
    fn linear_chain_orders_source_before_scale() {
        let mut blocks = Arena::new();
        let src = blocks.alloc(block(0, BlockKind::Source(SourceParams {
            output_type: double(),
            variant: SourceVariant::Constant { value: 1.0 },
        })));
        let scale = blocks.alloc(block(1, BlockKind::Scale(ScaleParams { gain: 2.0 })));
        let wires = vec![Wire { id: WireId::from_raw(0), source_port: obliq_ir::PortAddr::new(src, 0), target_port: obliq_ir::PortAddr::new(scale, 0) }];
        let sheet = sheet_from(blocks, wires);

        let sink = DiagnosticSink::new();
        let order = build_schedule(&sheet, &sink);
        let src_pos = order.iter().position(|&b| b == src).unwrap();
        let scale_pos = order.iter().position(|&b| b == scale).unwrap();
        assert!(src_pos < scale_pos);
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn feedback_through_a_stateful_transfer_function_is_not_a_loop() {
        let mut blocks = Arena::new();
        let tf = blocks.alloc(block(0, BlockKind::TransferFunction(TransferFunctionParams {
            numerator: vec![1.0],
            denominator: vec![1.0, 1.0],
            signal_type: double(),
        })));
        let scale = blocks.alloc(block(1, BlockKind::Scale(ScaleParams { gain: -1.0 })));
        let wires = vec![
            Wire { id: WireId::from_raw(0), source_port: obliq_ir::PortAddr::new(tf, 0), target_port: obliq_ir::PortAddr::new(scale, 0) },
            Wire { id: WireId::from_raw(1), source_port: obliq_ir::PortAddr::new(scale, 0), target_port: obliq_ir::PortAddr::new(tf, 0) },
        ];
        let sheet = sheet_from(blocks, wires);

        let sink = DiagnosticSink::new();
        let order = build_schedule(&sheet, &sink);
        assert_eq!(order.len(), 2);
        assert!(sink.diagnostics().is_empty(), "an integrator-closed loop must not warn");
    }

    #[test]
    fn a_genuine_algebraic_loop_is_broken_with_a_warning() {
        let mut blocks = Arena::new();
        let a = blocks.alloc(block(0, BlockKind::Scale(ScaleParams { gain: 1.0 })));
        let b = blocks.alloc(block(1, BlockKind::Scale(ScaleParams { gain: 1.0 })));
        let wires = vec![
            Wire { id: WireId::from_raw(0), source_port: obliq_ir::PortAddr::new(a, 0), target_port: obliq_ir::PortAddr::new(b, 0) },
            Wire { id: WireId::from_raw(1), source_port: obliq_ir::PortAddr::new(b, 0), target_port: obliq_ir::PortAddr::new(a, 0) },
        ];
        let sheet = sheet_from(blocks, wires);

        let sink = DiagnosticSink::new();
        let order = build_schedule(&sheet, &sink);
        assert_eq!(order.len(), 2);
        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.diagnostics()[0].code, codes::ALGEBRAIC_LOOP);
    }
}

//! Declarative catalog of block kinds: default parameters, port counts, and
//! port labels, keyed by the external serialization's `type` string.

use crate::model::{
    BlockKind, DemuxParams, Extrapolation, Lookup1dParams, Lookup2dParams, MultiplyParams,
    MuxParams, RecorderParams, ScaleParams, SourceParams, SourceVariant, SumParams,
    TransferFunctionParams, TrigOp, TrigParams,
};
use crate::types::{BaseType, SignalType};

/// Counts of input and output ports for a block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCounts {
    /// Number of input ports (excludes the enable port).
    pub inputs: u32,
    /// Number of output ports.
    pub outputs: u32,
}

/// Describes one entry in the block-kind catalog: how to build a default
/// instance and how to compute its port shape for a given parameter set.
pub struct BlockDescriptor {
    /// The `type` string used in the external serialization, e.g. `"scale"`.
    pub type_name: &'static str,
    /// Builds a reasonable default parameter set for a freshly placed block.
    pub default_kind: fn() -> BlockKind,
    /// Computes the port counts for an already-parameterized block kind.
    pub port_counts: fn(&BlockKind) -> PortCounts,
}

/// Computes port counts for every block kind. Most kinds are fixed-arity;
/// `sum`, `multiply`, `mux`, `demux`, `subsystem`, and `evaluate` are dynamic
/// functions of their parameters.
pub fn port_counts(kind: &BlockKind) -> PortCounts {
    match kind {
        BlockKind::Source(_) => PortCounts { inputs: 0, outputs: 1 },
        BlockKind::InputPort(_) => PortCounts { inputs: 0, outputs: 1 },
        BlockKind::OutputPort(_) => PortCounts { inputs: 1, outputs: 0 },
        BlockKind::Sum(p) => PortCounts { inputs: p.signs.chars().count() as u32, outputs: 1 },
        BlockKind::Multiply(p) => PortCounts { inputs: p.input_count, outputs: 1 },
        BlockKind::Scale(_) => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Abs => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Uminus => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Trig(p) => PortCounts {
            inputs: if p.op == TrigOp::Atan2 { 2 } else { 1 },
            outputs: 1,
        },
        BlockKind::Evaluate(p) => PortCounts { inputs: p.input_count, outputs: 1 },
        BlockKind::TransferFunction(_) => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Lookup1d(_) => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Lookup2d(_) => PortCounts { inputs: 2, outputs: 1 },
        BlockKind::MatrixMultiply => PortCounts { inputs: 2, outputs: 1 },
        BlockKind::Transpose => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::Mux(p) => PortCounts { inputs: p.rows * p.cols, outputs: 1 },
        BlockKind::Demux(p) => PortCounts {
            inputs: 1,
            outputs: p.input_type.element_count() as u32,
        },
        BlockKind::Cross => PortCounts { inputs: 2, outputs: 1 },
        BlockKind::Dot => PortCounts { inputs: 2, outputs: 1 },
        BlockKind::Mag => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::If => PortCounts { inputs: 3, outputs: 1 },
        BlockKind::Condition(_) => PortCounts { inputs: 1, outputs: 1 },
        BlockKind::SignalDisplay(_) => PortCounts { inputs: 1, outputs: 0 },
        BlockKind::SignalLogger(_) => PortCounts { inputs: 1, outputs: 0 },
        BlockKind::SheetLabelSink(_) => PortCounts { inputs: 1, outputs: 0 },
        BlockKind::SheetLabelSource(_) => PortCounts { inputs: 0, outputs: 1 },
        BlockKind::Subsystem(p) => PortCounts {
            inputs: p.input_ports.len() as u32,
            outputs: p.output_ports.len() as u32,
        },
    }
}

/// The full catalog, ordered to match §3's kind listing.
pub fn catalog() -> Vec<BlockDescriptor> {
    vec![
        BlockDescriptor {
            type_name: "source",
            default_kind: || {
                BlockKind::Source(SourceParams {
                    output_type: SignalType::Scalar { base: BaseType::Double },
                    variant: SourceVariant::Constant { value: 0.0 },
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "sum",
            default_kind: || BlockKind::Sum(SumParams { signs: "++".to_string() }),
            port_counts,
        },
        BlockDescriptor {
            type_name: "multiply",
            default_kind: || BlockKind::Multiply(MultiplyParams { input_count: 2 }),
            port_counts,
        },
        BlockDescriptor {
            type_name: "scale",
            default_kind: || BlockKind::Scale(ScaleParams { gain: 1.0 }),
            port_counts,
        },
        BlockDescriptor {
            type_name: "abs",
            default_kind: || BlockKind::Abs,
            port_counts,
        },
        BlockDescriptor {
            type_name: "uminus",
            default_kind: || BlockKind::Uminus,
            port_counts,
        },
        BlockDescriptor {
            type_name: "trig",
            default_kind: || BlockKind::Trig(TrigParams { op: TrigOp::Sin }),
            port_counts,
        },
        BlockDescriptor {
            type_name: "transfer_function",
            default_kind: || {
                BlockKind::TransferFunction(TransferFunctionParams {
                    numerator: vec![1.0],
                    denominator: vec![1.0, 1.0],
                    signal_type: SignalType::Scalar { base: BaseType::Double },
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "lookup_1d",
            default_kind: || {
                BlockKind::Lookup1d(Lookup1dParams {
                    breakpoints: vec![0.0, 1.0],
                    table_data: vec![0.0, 1.0],
                    extrapolation: Extrapolation::Clamp,
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "lookup_2d",
            default_kind: || {
                BlockKind::Lookup2d(Lookup2dParams {
                    row_breakpoints: vec![0.0, 1.0],
                    col_breakpoints: vec![0.0, 1.0],
                    table_data: vec![0.0, 0.0, 0.0, 0.0],
                    extrapolation: Extrapolation::Clamp,
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "matrix_multiply",
            default_kind: || BlockKind::MatrixMultiply,
            port_counts,
        },
        BlockDescriptor {
            type_name: "transpose",
            default_kind: || BlockKind::Transpose,
            port_counts,
        },
        BlockDescriptor {
            type_name: "mux",
            default_kind: || {
                BlockKind::Mux(MuxParams { rows: 2, cols: 1, base: BaseType::Double })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "demux",
            default_kind: || {
                BlockKind::Demux(DemuxParams {
                    input_type: SignalType::Vector { base: BaseType::Double, size: 2 },
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "cross",
            default_kind: || BlockKind::Cross,
            port_counts,
        },
        BlockDescriptor {
            type_name: "dot",
            default_kind: || BlockKind::Dot,
            port_counts,
        },
        BlockDescriptor {
            type_name: "mag",
            default_kind: || BlockKind::Mag,
            port_counts,
        },
        BlockDescriptor {
            type_name: "if",
            default_kind: || BlockKind::If,
            port_counts,
        },
        BlockDescriptor {
            type_name: "signal_display",
            default_kind: || {
                BlockKind::SignalDisplay(RecorderParams {
                    buffer: crate::model::BufferPolicy::Ring { max_samples: 1000 },
                })
            },
            port_counts,
        },
        BlockDescriptor {
            type_name: "signal_logger",
            default_kind: || {
                BlockKind::SignalLogger(RecorderParams { buffer: crate::model::BufferPolicy::Unbounded })
            },
            port_counts,
        },
    ]
}

/// Looks up a descriptor by its external `type` string.
///
/// Rebuilds the catalog on each call; it is a small fixed list of function
/// pointers, cheap relative to a parse/validate pass.
pub fn lookup(type_name: &str) -> Option<BlockDescriptor> {
    catalog().into_iter().find(|d| d.type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockKind, SumParams};

    #[test]
    fn sum_port_count_follows_signs_length() {
        let kind = BlockKind::Sum(SumParams { signs: "+-+".to_string() });
        assert_eq!(port_counts(&kind), PortCounts { inputs: 3, outputs: 1 });
    }

    #[test]
    fn fixed_arity_blocks() {
        assert_eq!(port_counts(&BlockKind::Abs), PortCounts { inputs: 1, outputs: 1 });
        assert_eq!(port_counts(&BlockKind::Cross), PortCounts { inputs: 2, outputs: 1 });
        assert_eq!(port_counts(&BlockKind::If), PortCounts { inputs: 3, outputs: 1 });
    }

    #[test]
    fn lookup_by_type_name() {
        let descriptor = lookup("scale").expect("scale must be registered");
        assert_eq!(descriptor.type_name, "scale");
        let kind = (descriptor.default_kind)();
        assert_eq!(kind.name(), "scale");
    }

    #[test]
    fn unknown_type_name_is_absent() {
        assert!(lookup("not_a_real_block").is_none());
    }

    #[test]
    fn demux_output_count_matches_element_count() {
        let kind = BlockKind::Demux(DemuxParams {
            input_type: SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 3 },
        });
        assert_eq!(port_counts(&kind), PortCounts { inputs: 1, outputs: 6 });
    }
}

//! Static output-shape inference.
//!
//! Most block kinds don't carry their own output [`SignalType`] in their
//! parameters; this mirrors `obliq_blocks::step`'s per-kind shape behavior,
//! but computed ahead of time from already-known upstream shapes instead of
//! from runtime [`obliq_blocks::value::Value`]s.

use std::collections::HashMap;

use obliq_common::InternalError;
use obliq_ir::{BaseType, BlockId, BlockKind, PortAddr, Sheet, SignalType};

use crate::error::CodegenError;

/// What a block produces: one shaped output, or `demux`'s list of per-index
/// scalar outputs.
pub enum Shape {
    Single(SignalType),
    Multi(Vec<SignalType>),
    /// No output a consumer can reference (`output_port`, the sinks).
    None,
}

impl Shape {
    /// The shape at output index `index`. `Single` ignores `index` (always
    /// port 0); `None` is never queried, since nothing wires into a sink.
    pub fn at(&self, index: i32) -> Result<SignalType, CodegenError> {
        match self {
            Shape::Single(t) => Ok(*t),
            Shape::Multi(list) => list
                .get(index as usize)
                .copied()
                .ok_or_else(|| InternalError::new("demux output index out of range").into()),
            Shape::None => Err(InternalError::new("referenced the output of a block with no output").into()),
        }
    }
}

/// Finds the shape of whatever drives `target`'s input `index`, or an
/// internal error if nothing does (a validated, flattened model never
/// leaves a required input unwired).
fn driving_shape(sheet: &Sheet, shapes: &HashMap<BlockId, Shape>, target: PortAddr) -> Result<SignalType, CodegenError> {
    let wire = sheet
        .wires_into(target)
        .next()
        .ok_or_else(|| InternalError::new(format!("{target:?} has no driving wire")))?;
    let source_shape = shapes
        .get(&wire.source_port.block)
        .ok_or_else(|| InternalError::new("driving block's shape not yet computed"))?;
    source_shape.at(wire.source_port.index)
}

/// Computes `block_id`'s output shape from its kind and already-computed
/// upstream shapes. Must be called in the same topological order the
/// emitter walks blocks in.
pub fn infer(
    sheet: &Sheet,
    block_id: BlockId,
    kind: &BlockKind,
    shapes: &HashMap<BlockId, Shape>,
) -> Result<Shape, CodegenError> {
    let double = || SignalType::Scalar { base: BaseType::Double };
    let bool_ = || SignalType::Scalar { base: BaseType::Bool };
    let first_input = |index: i32| driving_shape(sheet, shapes, PortAddr::new(block_id, index));

    Ok(match kind {
        BlockKind::Source(p) => Shape::Single(p.output_type),
        BlockKind::InputPort(p) => Shape::Single(p.signal_type),
        BlockKind::OutputPort(_) => Shape::None,
        BlockKind::Sum(_) | BlockKind::Multiply(_) | BlockKind::Scale(_) | BlockKind::Abs | BlockKind::Uminus => {
            Shape::Single(first_input(0)?)
        }
        BlockKind::Trig(_) => Shape::Single(double()),
        BlockKind::Evaluate(_) => Shape::Single(double()),
        BlockKind::TransferFunction(p) => Shape::Single(p.signal_type),
        BlockKind::Lookup1d(_) | BlockKind::Lookup2d(_) => Shape::Single(double()),
        BlockKind::MatrixMultiply => {
            let a = first_input(0)?;
            let b = first_input(1)?;
            Shape::Single(matrix_multiply_shape(a, b)?)
        }
        BlockKind::Transpose => {
            let a = first_input(0)?;
            Shape::Single(transpose_shape(a))
        }
        BlockKind::Mux(p) => {
            let shape = if p.rows == 1 || p.cols == 1 {
                SignalType::Vector { base: p.base, size: p.rows.max(p.cols) }
            } else {
                SignalType::Matrix { base: p.base, rows: p.rows, cols: p.cols }
            };
            Shape::Single(shape)
        }
        BlockKind::Demux(p) => {
            let base = p.input_type.base();
            Shape::Multi(vec![SignalType::Scalar { base }; p.input_type.element_count()])
        }
        BlockKind::Cross => {
            let a = first_input(0)?;
            Shape::Single(if a.element_count() == 2 { double() } else { SignalType::Vector { base: BaseType::Double, size: 3 } })
        }
        BlockKind::Dot => Shape::Single(double()),
        BlockKind::Mag => Shape::Single(double()),
        BlockKind::If => Shape::Single(first_input(1)?),
        BlockKind::Condition(_) => Shape::Single(bool_()),
        BlockKind::SignalDisplay(_) | BlockKind::SignalLogger(_) | BlockKind::SheetLabelSink(_) => Shape::None,
        // Flattening rewrites every wire sourced from a sheet_label_source to
        // point at its matching sink's real driver instead, so nothing ever
        // wires into this block's output; see obliq_flatten::resolve_sheet_labels.
        BlockKind::SheetLabelSource(_) => Shape::None,
        BlockKind::Subsystem(_) => {
            return Err(InternalError::new("subsystem block survived flattening; shapes cannot be inferred").into())
        }
    })
}

fn matrix_multiply_shape(a: SignalType, b: SignalType) -> Result<SignalType, CodegenError> {
    use SignalType::*;
    Ok(match (a, b) {
        (Scalar { .. }, other) => other,
        (Vector { size, .. }, Matrix { base, rows, cols }) if size == rows => {
            if cols == 1 {
                Scalar { base }
            } else {
                Vector { base, size: cols }
            }
        }
        (Matrix { rows, cols, base }, Vector { size, .. }) if cols == size => {
            if rows == 1 {
                Scalar { base }
            } else {
                Vector { base, size: rows }
            }
        }
        (Matrix { rows: m, cols: n, base }, Matrix { rows: n2, cols: p, .. }) if n == n2 => {
            Matrix { base, rows: m, cols: p }
        }
        (a, b) => return Err(InternalError::new(format!("matrix_multiply: incompatible shapes {a:?} and {b:?}")).into()),
    })
}

fn transpose_shape(a: SignalType) -> SignalType {
    match a {
        SignalType::Scalar { .. } => a,
        SignalType::Vector { base, size } => SignalType::Matrix { base, rows: size, cols: 1 },
        SignalType::Matrix { base, rows, cols } => SignalType::Matrix { base, rows: cols, cols: rows },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(size: Option<u32>) -> SignalType {
        match size {
            None => SignalType::Scalar { base: BaseType::Double },
            Some(n) => SignalType::Vector { base: BaseType::Double, size: n },
        }
    }

    #[test]
    fn matrix_times_vector_matches_matrix_multiply_block() {
        let a = SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 3 };
        let b = double(Some(3));
        let out = matrix_multiply_shape(a, b).unwrap();
        assert_eq!(out, double(Some(2)));
    }

    #[test]
    fn scalar_times_matrix_keeps_matrix_shape() {
        let a = double(None);
        let b = SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 2 };
        assert_eq!(matrix_multiply_shape(a, b).unwrap(), b);
    }

    #[test]
    fn incompatible_shapes_are_rejected() {
        let a = double(Some(2));
        let b = double(Some(3));
        assert!(matrix_multiply_shape(a, b).is_err());
    }

    #[test]
    fn transpose_of_vector_becomes_a_column_matrix() {
        let v = double(Some(3));
        assert_eq!(transpose_shape(v), SignalType::Matrix { base: BaseType::Double, rows: 3, cols: 1 });
    }

    #[test]
    fn transpose_of_scalar_is_identity() {
        assert_eq!(transpose_shape(double(None)), double(None));
    }

    #[test]
    fn demux_shape_splits_into_scalar_elements() {
        let kind = BlockKind::Demux(obliq_ir::DemuxParams { input_type: double(Some(3)) });
        let sheet = empty_sheet();
        let shapes = HashMap::new();
        match infer(&sheet, BlockId::from_raw(0), &kind, &shapes).unwrap() {
            Shape::Multi(list) => assert_eq!(list, vec![double(None); 3]),
            _ => panic!("expected Multi"),
        }
    }

    fn empty_sheet() -> Sheet {
        Sheet {
            id: obliq_ir::SheetId::from_raw(0),
            name: obliq_common::Ident::from_raw(0),
            blocks: obliq_ir::Arena::new(),
            wires: Vec::new(),
            extents: obliq_ir::Extents::default(),
        }
    }
}

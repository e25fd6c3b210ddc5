//! Model traversal helpers shared by multiple validation rules.
//!
//! Most of this module is dedicated to [`output_type`]: computing the
//! signal type a block emits on a given output port, tracing through wires
//! for the blocks whose output type simply follows one of their inputs.

use std::collections::HashSet;

use obliq_ir::{Block, BlockId, BlockKind, Model, PortAddr, Sheet, SheetId, SignalType, Wire};

/// Finds the (at most one, per V2) wire terminating at `port` within `sheet`.
pub fn wire_into<'a>(sheet: &'a Sheet, port: PortAddr) -> Option<&'a Wire> {
    sheet.wires.iter().find(|w| w.target_port == port)
}

/// Computes the signal type flowing into `block`'s input `index`, by
/// resolving the wire feeding it and recursing into the source block's
/// output type. Returns `None` if unconnected or the type cannot be resolved.
pub fn input_type(model: &Model, sheet: &Sheet, block_id: BlockId, index: i32) -> Option<SignalType> {
    let mut visiting = HashSet::new();
    input_type_inner(model, sheet, block_id, index, &mut visiting)
}

fn input_type_inner(
    model: &Model,
    sheet: &Sheet,
    block_id: BlockId,
    index: i32,
    visiting: &mut HashSet<(SheetId, BlockId)>,
) -> Option<SignalType> {
    let wire = wire_into(sheet, PortAddr::new(block_id, index))?;
    let source = sheet.block(wire.source_port.block)?;
    output_type_inner(model, sheet, source, visiting)
}

/// Computes the signal type `block` emits on its (sole, in the common case)
/// output port. Blocks with more than one output (`demux`, `subsystem`) are
/// handled by their dedicated rules rather than through this helper.
pub fn output_type(model: &Model, sheet: &Sheet, block: &Block) -> Option<SignalType> {
    let mut visiting = HashSet::new();
    output_type_inner(model, sheet, block, &mut visiting)
}

fn output_type_inner(
    model: &Model,
    sheet: &Sheet,
    block: &Block,
    visiting: &mut HashSet<(SheetId, BlockId)>,
) -> Option<SignalType> {
    if !visiting.insert((sheet.id, block.id)) {
        return None;
    }

    let result = match &block.kind {
        BlockKind::Source(p) => Some(p.output_type.clone()),
        BlockKind::InputPort(p) => Some(p.signal_type.clone()),
        BlockKind::OutputPort(p) => Some(p.signal_type.clone()),
        BlockKind::Sum(_) | BlockKind::Multiply(_) | BlockKind::Scale(_) | BlockKind::Uminus | BlockKind::Abs => {
            input_type_inner(model, sheet, block.id, 0, visiting)
        }
        BlockKind::Trig(_) | BlockKind::Evaluate(_) | BlockKind::Lookup1d(_) | BlockKind::Lookup2d(_) | BlockKind::Mag => {
            Some(SignalType::Scalar { base: obliq_ir::BaseType::Double })
        }
        BlockKind::TransferFunction(p) => Some(p.signal_type.clone()),
        BlockKind::MatrixMultiply => matrix_multiply_output(model, sheet, block, visiting),
        BlockKind::Transpose => transpose_output(model, sheet, block, visiting),
        BlockKind::Mux(p) => Some(mux_output_type(p)),
        BlockKind::Demux(_) => None,
        BlockKind::Cross => input_type_inner(model, sheet, block.id, 0, visiting),
        BlockKind::Dot => Some(SignalType::Scalar { base: obliq_ir::BaseType::Double }),
        BlockKind::If => input_type_inner(model, sheet, block.id, 1, visiting),
        BlockKind::Condition(_) => Some(SignalType::Scalar { base: obliq_ir::BaseType::Bool }),
        BlockKind::SignalDisplay(_) | BlockKind::SignalLogger(_) => None,
        BlockKind::SheetLabelSink(_) => None,
        BlockKind::SheetLabelSource(p) => sheet_label_source_type(model, sheet, p, visiting),
        BlockKind::Subsystem(_) => None,
    };

    visiting.remove(&(sheet.id, block.id));
    result
}

fn mux_output_type(p: &obliq_ir::MuxParams) -> SignalType {
    if p.rows == 1 || p.cols == 1 {
        SignalType::Vector { base: p.base, size: p.rows * p.cols }
    } else {
        SignalType::Matrix { base: p.base, rows: p.rows, cols: p.cols }
    }
}

fn matrix_multiply_output(
    model: &Model,
    sheet: &Sheet,
    block: &Block,
    visiting: &mut HashSet<(SheetId, BlockId)>,
) -> Option<SignalType> {
    let a = input_type_inner(model, sheet, block.id, 0, visiting)?;
    let b = input_type_inner(model, sheet, block.id, 1, visiting)?;
    shape_matrix_multiply(&a, &b)
}

/// Computes the output shape of `matrix_multiply` per §4.3's shape table, or
/// `None` if `a`/`b` are not a legal combination.
pub fn shape_matrix_multiply(a: &SignalType, b: &SignalType) -> Option<SignalType> {
    use SignalType::*;
    if a.base() != b.base() {
        return None;
    }
    let base = a.base();
    match (a, b) {
        (Scalar { .. }, Scalar { .. }) => Some(Scalar { base }),
        (Scalar { .. }, other) => Some(other.clone()),
        (Vector { size: n, .. }, Matrix { rows, cols: p, .. }) if n == rows => {
            Some(Vector { base, size: *p })
        }
        (Matrix { rows: m, cols: n, .. }, Vector { size: n2, .. }) if n == n2 => {
            Some(Vector { base, size: *m })
        }
        (Matrix { rows: m, cols: n, .. }, Matrix { rows: n2, cols: p, .. }) if n == n2 => {
            Some(Matrix { base, rows: *m, cols: *p })
        }
        _ => None,
    }
}

fn transpose_output(
    model: &Model,
    sheet: &Sheet,
    block: &Block,
    visiting: &mut HashSet<(SheetId, BlockId)>,
) -> Option<SignalType> {
    let input = input_type_inner(model, sheet, block.id, 0, visiting)?;
    Some(shape_transpose(&input))
}

/// Computes the output shape of `transpose` per §4.3.
pub fn shape_transpose(input: &SignalType) -> SignalType {
    match input {
        SignalType::Scalar { base } => SignalType::Scalar { base: *base },
        SignalType::Vector { base, size } => SignalType::Matrix { base: *base, rows: *size, cols: 1 },
        SignalType::Matrix { base, rows, cols } => SignalType::Matrix { base: *base, rows: *cols, cols: *rows },
    }
}

fn sheet_label_source_type(
    model: &Model,
    sheet: &Sheet,
    params: &obliq_ir::SheetLabelParams,
    visiting: &mut HashSet<(SheetId, BlockId)>,
) -> Option<SignalType> {
    for sheet_id in sibling_scope(model, sheet.id) {
        let candidate_sheet = model.sheet(sheet_id)?;
        for (_id, candidate) in candidate_sheet.blocks.iter() {
            if let BlockKind::SheetLabelSink(sink_params) = &candidate.kind {
                if sink_params.signal_name == params.signal_name {
                    return input_type_inner(model, candidate_sheet, candidate.id, 0, visiting);
                }
            }
        }
    }
    None
}

/// Returns every sheet id in the same sheet-label scope as `sheet_id`: the
/// sibling sheets of the subsystem that owns it, or `[sheet_id]` if it is not
/// owned by any subsystem (including the main sheet).
pub fn sibling_scope(model: &Model, sheet_id: SheetId) -> Vec<SheetId> {
    for (_owner_id, owner_sheet) in model.sheets.iter() {
        for (_block_id, block) in owner_sheet.blocks.iter() {
            if let BlockKind::Subsystem(p) = &block.kind {
                if p.sheets.contains(&sheet_id) {
                    return p.sheets.clone();
                }
            }
        }
    }
    vec![sheet_id]
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_ir::{BaseType, SignalType};

    #[test]
    fn matrix_multiply_shapes_match_spec_table() {
        let scalar = SignalType::Scalar { base: BaseType::Double };
        let vec3 = SignalType::Vector { base: BaseType::Double, size: 3 };
        let mat2x3 = SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 3 };
        let vec2 = SignalType::Vector { base: BaseType::Double, size: 2 };

        assert_eq!(shape_matrix_multiply(&scalar, &scalar), Some(scalar.clone()));
        assert_eq!(shape_matrix_multiply(&scalar, &mat2x3), Some(mat2x3.clone()));
        assert_eq!(shape_matrix_multiply(&mat2x3, &vec3), Some(vec2.clone()));
        assert_eq!(shape_matrix_multiply(&vec3, &mat2x3), None);
    }

    #[test]
    fn matrix_multiply_rejects_dimension_mismatch() {
        let mat2x3 = SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 3 };
        let wrong_vec = SignalType::Vector { base: BaseType::Double, size: 2 };
        assert_eq!(shape_matrix_multiply(&mat2x3, &wrong_vec), None);
    }

    #[test]
    fn transpose_shapes() {
        let vec3 = SignalType::Vector { base: BaseType::Double, size: 3 };
        assert_eq!(shape_transpose(&vec3), SignalType::Matrix { base: BaseType::Double, rows: 3, cols: 1 });
        let mat2x3 = SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 3 };
        assert_eq!(shape_transpose(&mat2x3), SignalType::Matrix { base: BaseType::Double, rows: 3, cols: 2 });
    }
}

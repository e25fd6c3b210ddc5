//! Computes the C struct layout (`inputs_t` / `outputs_t` / `states_t`) and
//! the per-block C variable names shared by the header, source, and
//! properties emitters.

use std::collections::HashMap;

use obliq_common::Interner;
use obliq_flatten::FlattenedModel;
use obliq_ir::{BlockId, BlockKind, SignalType};

use crate::ctype::uses_bool;
use crate::error::CodegenError;
use crate::ident::sanitize;

/// One `inputs_t`/`outputs_t` struct member.
pub struct Field {
    /// The sanitized C field name (from the port's declared name).
    pub name: String,
    /// The field's declared shape.
    pub shape: SignalType,
}

/// One stateful `transfer_function`'s continuous-state storage: `element_count`
/// state vectors of length `order`, stored `[element][state]` (§9's decision).
pub struct StateSlot {
    /// The block owning this state.
    pub block_id: BlockId,
    /// The sanitized, unique C field name for this block's state array.
    pub field_name: String,
    /// Number of broadcast elements (1 for a scalar transfer function).
    pub element_count: usize,
    /// The denominator's order: number of continuous states per element.
    pub order: usize,
    /// Numerator/denominator coefficients, highest order first.
    pub numerator: Vec<f64>,
    /// See [`obliq_ir::TransferFunctionParams::denominator`].
    pub denominator: Vec<f64>,
    /// The broadcast element type.
    pub signal_type: SignalType,
}

/// Struct layout plus block naming, shared by every emitter.
pub struct Layout {
    /// `inputs_t` members, in the order their `input_port` blocks were declared.
    pub inputs: Vec<Field>,
    /// `outputs_t` members, in the order their `output_port` blocks were declared.
    pub outputs: Vec<Field>,
    /// `states_t` members, one per stateful `transfer_function`.
    pub states: Vec<StateSlot>,
    /// Sanitized, unique C local-variable name for every block in the sheet.
    pub block_names: HashMap<BlockId, String>,
    /// `true` if any declared port or state uses `bool`, for `<stdbool.h>`.
    pub uses_bool: bool,
}

impl Layout {
    /// Builds a layout by walking `flattened`'s single sheet once.
    pub fn build(flattened: &FlattenedModel, interner: &Interner) -> Result<Self, CodegenError> {
        let sheet = flattened.model.main();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut states = Vec::new();
        let mut block_names = HashMap::with_capacity(sheet.blocks.len());
        let mut uses_bool_any = false;

        let mut block_name_seen: HashMap<String, u32> = HashMap::new();
        let mut input_name_seen: HashMap<String, u32> = HashMap::new();
        let mut output_name_seen: HashMap<String, u32> = HashMap::new();

        for (block_id, block) in sheet.blocks.iter() {
            let base_name = sanitize(interner.resolve(block.name));
            let unique_name = dedupe(&mut block_name_seen, base_name);
            block_names.insert(block_id, unique_name.clone());

            match &block.kind {
                BlockKind::InputPort(p) => {
                    uses_bool_any |= uses_bool(&p.signal_type);
                    let field_name = dedupe(&mut input_name_seen, sanitize(interner.resolve(p.port_name)));
                    inputs.push(Field { name: field_name, shape: p.signal_type });
                }
                BlockKind::OutputPort(p) => {
                    uses_bool_any |= uses_bool(&p.signal_type);
                    let field_name = dedupe(&mut output_name_seen, sanitize(interner.resolve(p.port_name)));
                    outputs.push(Field { name: field_name, shape: p.signal_type });
                }
                BlockKind::TransferFunction(p) if p.order() >= 1 => {
                    states.push(StateSlot {
                        block_id,
                        field_name: unique_name,
                        element_count: p.signal_type.element_count(),
                        order: p.order(),
                        numerator: p.numerator.clone(),
                        denominator: p.denominator.clone(),
                        signal_type: p.signal_type,
                    });
                }
                _ => {}
            }
        }

        Ok(Self { inputs, outputs, states, block_names, uses_bool: uses_bool_any })
    }

    /// `true` if `step` needs a `states_t` argument and a `derivatives` prototype.
    pub fn is_stateful(&self) -> bool {
        !self.states.is_empty()
    }

    /// The C variable name for `block_id`; falls back to a positional name if
    /// the id is somehow absent (never happens for a block the layout walked).
    pub fn name_of(&self, block_id: BlockId) -> &str {
        self.block_names.get(&block_id).map(String::as_str).unwrap_or("unknown_block")
    }
}

fn dedupe(seen: &mut HashMap<String, u32>, base: String) -> String {
    match seen.get_mut(&base) {
        None => {
            seen.insert(base.clone(), 0);
            base
        }
        Some(count) => {
            *count += 1;
            format!("{base}_{count}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_flatten::FlattenedModel;
    use obliq_ir::{
        Arena as IrArena, Block, BlockId, Extents, GlobalSettings, Model, Position, Sheet, SheetId,
        SourceParams, SourceVariant,
    };
    use obliq_ir::{BaseType, SignalType};

    fn double() -> SignalType {
        SignalType::Scalar { base: BaseType::Double }
    }

    fn one_block_model(interner: &Interner, block_name: &str) -> Model {
        let mut blocks: IrArena<BlockId, Block> = IrArena::new();
        blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Source(SourceParams { output_type: double(), variant: SourceVariant::Constant { value: 1.0 } }),
            name: interner.get_or_intern(block_name),
            position: Position { x: 0.0, y: 0.0 },
        });
        let mut sheets = IrArena::new();
        let sheet_id = sheets.alloc(Sheet {
            id: SheetId::from_raw(0),
            name: interner.get_or_intern("main"),
            blocks,
            wires: Vec::new(),
            extents: Extents::default(),
        });
        Model {
            version: "1".into(),
            name: interner.get_or_intern("m"),
            sheets,
            main_sheet: sheet_id,
            global_settings: GlobalSettings::default(),
        }
    }

    #[test]
    fn a_model_with_no_ports_or_transfer_functions_is_stateless() {
        let interner = Interner::new();
        let model = one_block_model(&interner, "src");
        let flattened = FlattenedModel { model, enable_chains: Default::default() };
        let layout = Layout::build(&flattened, &interner).unwrap();
        assert!(!layout.is_stateful());
        assert!(layout.inputs.is_empty());
        assert!(layout.outputs.is_empty());
        assert!(layout.states.is_empty());
    }

    #[test]
    fn duplicate_block_names_get_a_numeric_suffix() {
        let interner = Interner::new();
        let mut blocks: IrArena<BlockId, Block> = IrArena::new();
        let a = blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::Source(SourceParams { output_type: double(), variant: SourceVariant::Constant { value: 1.0 } }),
            name: interner.get_or_intern("node"),
            position: Position { x: 0.0, y: 0.0 },
        });
        let b = blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::Source(SourceParams { output_type: double(), variant: SourceVariant::Constant { value: 2.0 } }),
            name: interner.get_or_intern("node"),
            position: Position { x: 1.0, y: 0.0 },
        });
        let mut sheets = IrArena::new();
        let sheet_id = sheets.alloc(Sheet {
            id: SheetId::from_raw(0),
            name: interner.get_or_intern("main"),
            blocks,
            wires: Vec::new(),
            extents: Extents::default(),
        });
        let model = Model {
            version: "1".into(),
            name: interner.get_or_intern("m"),
            sheets,
            main_sheet: sheet_id,
            global_settings: GlobalSettings::default(),
        };
        let flattened = FlattenedModel { model, enable_chains: Default::default() };
        let layout = Layout::build(&flattened, &interner).unwrap();
        assert_eq!(layout.name_of(a), "node");
        assert_eq!(layout.name_of(b), "node_1");
    }
}

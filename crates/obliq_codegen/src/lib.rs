//! C99 code generation from a flattened block-diagram model.
//!
//! Emits a freestanding-plus-`math.h` C99 library: a header declaring
//! `inputs_t`/`outputs_t`/(optional)`states_t` and the `init`/`step`/
//! `derivatives` prototypes, a source file implementing them, and a
//! library-properties text record. Block statements are emitted in the same
//! topological order [`obliq_sim`] steps in, via the shared
//! [`obliq_sim::schedule::build_schedule`] — both crates must walk a
//! flattened graph identically, or generated C would silently diverge from
//! the interpreter it's meant to match.

#![warn(missing_docs)]

pub mod body;
pub mod ctype;
pub mod error;
pub mod header;
pub mod ident;
pub mod layout;
pub mod properties;
pub mod shapes;
pub mod source;

use obliq_common::Interner;
use obliq_diagnostics::{Diagnostic, DiagnosticSink};
use obliq_flatten::FlattenedModel;

pub use error::CodegenError;
pub use layout::Layout;

/// The three generated artifacts plus any diagnostics (e.g. a broken
/// algebraic loop) surfaced while walking the graph.
///
/// The literal `{ fileName, headerFile, sourceFile, libraryProperties }`
/// shape is enriched here with a `diagnostics` field: callers need the
/// warnings `build_schedule` collects along the way, and a `Vec` that's
/// empty on the happy path costs nothing.
pub struct CodeGenResult {
    /// The sanitized, lowercased model name shared by the header/source
    /// file names (`<file_name>.h`, `<file_name>.c`).
    pub file_name: String,
    /// The full header text.
    pub header_file: String,
    /// The full source text.
    pub source_file: String,
    /// The library-properties text record.
    pub library_properties: String,
    /// Diagnostics collected while scheduling and emitting (e.g. a broken
    /// algebraic loop's warning).
    pub diagnostics: Vec<Diagnostic>,
}

/// Generates a C99 library from `flattened`, naming files after
/// `model_name`.
pub fn generate(flattened: &FlattenedModel, model_name: &str, interner: &Interner) -> Result<CodeGenResult, CodegenError> {
    let sheet = flattened.model.main();
    if sheet.blocks.is_empty() {
        return Err(CodegenError::EmptyModel);
    }

    let file_name = ident::sanitize(&model_name.to_lowercase());
    let layout = Layout::build(flattened, interner)?;
    let sink = DiagnosticSink::new();
    let emitted = body::emit(&file_name, flattened, interner, &layout, &sink)?;

    let header_file = header::emit(&file_name, &layout);
    let source_file = source::emit(&file_name, &format!("{file_name}.h"), &layout, &emitted);
    let library_properties = properties::emit(&file_name, &layout, "c99");

    Ok(CodeGenResult {
        file_name,
        header_file,
        source_file,
        library_properties,
        diagnostics: sink.take_all(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_ir::{
        Arena as IrArena, Block, BlockId, BlockKind, Extents, GlobalSettings, Model, PortAddr,
        PortBlockParams, Position, ScaleParams, Sheet, SheetId, TransferFunctionParams, Wire, WireId,
    };
    use obliq_ir::{BaseType, SignalType};

    fn double() -> SignalType {
        SignalType::Scalar { base: BaseType::Double }
    }

    fn flattened_from(model: Model) -> FlattenedModel {
        FlattenedModel { model, enable_chains: Default::default() }
    }

    #[test]
    fn empty_model_is_rejected() {
        let interner = Interner::new();
        let blocks: IrArena<BlockId, Block> = IrArena::new();
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
        let err = generate(&flattened_from(model), "m", &interner).unwrap_err();
        assert!(matches!(err, CodegenError::EmptyModel));
    }

    #[test]
    fn a_scale_chain_generates_header_and_source_with_no_states() {
        let interner = Interner::new();
        let mut blocks: IrArena<BlockId, Block> = IrArena::new();
        let in_id = blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::InputPort(PortBlockParams { port_name: interner.get_or_intern("throttle"), signal_type: double() }),
            name: interner.get_or_intern("throttle_in"),
            position: Position { x: 0.0, y: 0.0 },
        });
        let scale_id = blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::Scale(ScaleParams { gain: 2.0 }),
            name: interner.get_or_intern("doubler"),
            position: Position { x: 1.0, y: 0.0 },
        });
        let out_id = blocks.alloc(Block {
            id: BlockId::from_raw(2),
            kind: BlockKind::OutputPort(PortBlockParams { port_name: interner.get_or_intern("speed"), signal_type: double() }),
            name: interner.get_or_intern("speed_out"),
            position: Position { x: 2.0, y: 0.0 },
        });
        let wires = vec![
            Wire { id: WireId::from_raw(0), source_port: PortAddr::new(in_id, 0), target_port: PortAddr::new(scale_id, 0) },
            Wire { id: WireId::from_raw(1), source_port: PortAddr::new(scale_id, 0), target_port: PortAddr::new(out_id, 0) },
        ];
        let mut sheets = IrArena::new();
        let sheet_id = sheets.alloc(Sheet {
            id: SheetId::from_raw(0),
            name: interner.get_or_intern("main"),
            blocks,
            wires,
            extents: Extents::default(),
        });
        let model = Model {
            version: "1".into(),
            name: interner.get_or_intern("engine"),
            sheets,
            main_sheet: sheet_id,
            global_settings: GlobalSettings::default(),
        };

        let result = generate(&flattened_from(model), "Engine", &interner).unwrap();
        assert_eq!(result.file_name, "engine");
        assert!(result.header_file.contains("engine_inputs_t"));
        assert!(result.header_file.contains("double throttle;"));
        assert!(result.header_file.contains("double speed;"));
        assert!(!result.header_file.contains("states_t"));
        assert!(!result.header_file.contains("derivatives"));
        assert!(result.source_file.contains("model->outputs.speed = doubler;"));
        assert!(result.source_file.contains("doubler = (2.0) * model->inputs.throttle;"));
        assert!(result.library_properties.contains("stateful = false"));
    }

    #[test]
    fn a_stateful_transfer_function_emits_derivatives_and_rk4() {
        let interner = Interner::new();
        let mut blocks: IrArena<BlockId, Block> = IrArena::new();
        let in_id = blocks.alloc(Block {
            id: BlockId::from_raw(0),
            kind: BlockKind::InputPort(PortBlockParams { port_name: interner.get_or_intern("u"), signal_type: double() }),
            name: interner.get_or_intern("u_in"),
            position: Position { x: 0.0, y: 0.0 },
        });
        let tf_id = blocks.alloc(Block {
            id: BlockId::from_raw(1),
            kind: BlockKind::TransferFunction(TransferFunctionParams {
                numerator: vec![1.0],
                denominator: vec![1.0, 3.0, 2.0],
                signal_type: double(),
            }),
            name: interner.get_or_intern("plant"),
            position: Position { x: 1.0, y: 0.0 },
        });
        let out_id = blocks.alloc(Block {
            id: BlockId::from_raw(2),
            kind: BlockKind::OutputPort(PortBlockParams { port_name: interner.get_or_intern("y"), signal_type: double() }),
            name: interner.get_or_intern("y_out"),
            position: Position { x: 2.0, y: 0.0 },
        });
        let wires = vec![
            Wire { id: WireId::from_raw(0), source_port: PortAddr::new(in_id, 0), target_port: PortAddr::new(tf_id, 0) },
            Wire { id: WireId::from_raw(1), source_port: PortAddr::new(tf_id, 0), target_port: PortAddr::new(out_id, 0) },
        ];
        let mut sheets = IrArena::new();
        let sheet_id = sheets.alloc(Sheet {
            id: SheetId::from_raw(0),
            name: interner.get_or_intern("main"),
            blocks,
            wires,
            extents: Extents::default(),
        });
        let model = Model {
            version: "1".into(),
            name: interner.get_or_intern("plant_model"),
            sheets,
            main_sheet: sheet_id,
            global_settings: GlobalSettings::default(),
        };

        let result = generate(&flattened_from(model), "plant_model", &interner).unwrap();
        assert!(result.header_file.contains("plant_model_states_t"));
        assert!(result.header_file.contains("double plant[1][2];"));
        assert!(result.header_file.contains(
            "void plant_model_derivatives(const plant_model_t *model, double t, const plant_model_states_t *state, plant_model_states_t *deriv);"
        ));
        assert!(result.source_file.contains("plant_model_derivatives"));
        assert!(result.source_file.contains("plant_model_combine_rk4"));
        assert!(result.source_file.contains("plant_model_offset_states"));
        assert!(result.library_properties.contains("transfer_function_count = 1"));
    }
}

//! The model IR: sheets, blocks, wires, and hierarchical subsystems.
//!
//! A [`Model`] is a tree of [`Sheet`]s. Each sheet owns an arena of [`Block`]s
//! and a list of [`Wire`]s connecting their ports. Hierarchy comes from blocks
//! of [`BlockKind::Subsystem`], whose parameters embed further sheets; these
//! are resolved away during flattening, not here.

use crate::arena::Arena;
use crate::ids::{BlockId, SheetId, WireId};
use crate::types::SignalType;
use obliq_common::Ident;
use obliq_source::Span;
use serde::{Deserialize, Serialize};

/// The address of one port: the block that owns it and its index.
///
/// Index `0` is the default port. A subsystem's enable input is addressed
/// with index `-1` and never appears as a wire target elsewhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PortAddr {
    /// The block that owns this port.
    pub block: BlockId,
    /// The port index on that block.
    pub index: i32,
}

impl PortAddr {
    /// Creates a port address.
    pub fn new(block: BlockId, index: i32) -> Self {
        Self { block, index }
    }

    /// The enable-input address (`index == -1`) for a subsystem block.
    pub fn enable(block: BlockId) -> Self {
        Self { block, index: -1 }
    }
}

/// A directed connection from one block's output port to another's input port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Wire {
    /// The unique ID of this wire within its sheet.
    pub id: WireId,
    /// The output port this wire carries a value from.
    pub source_port: PortAddr,
    /// The input (or enable) port this wire delivers its value to.
    pub target_port: PortAddr,
}

/// A source variant for [`BlockKind::Source`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceVariant {
    /// Fixed value for the entire run.
    Constant {
        /// The constant value.
        value: f64,
    },
    /// `amplitude * sin(2*pi*frequency*t + phase)`.
    Sine {
        /// Peak amplitude.
        amplitude: f64,
        /// Frequency in Hz.
        frequency: f64,
        /// Phase offset in radians.
        phase: f64,
    },
    /// `0` before `step_time`, `final_value` at and after it.
    Step {
        /// Time the step occurs.
        step_time: f64,
        /// Value after the step.
        final_value: f64,
    },
    /// `slope * (t - start_time)` for `t >= start_time`, else `0`.
    Ramp {
        /// Rate of change per unit time.
        slope: f64,
        /// Time the ramp begins.
        start_time: f64,
    },
    /// Any other variant name; emits a zero of the configured type.
    Unsupported {
        /// The variant name as given, preserved for diagnostics.
        name: Ident,
    },
}

/// Parameters for [`BlockKind::Source`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceParams {
    /// The output signal type.
    pub output_type: SignalType,
    /// The time-domain waveform variant.
    pub variant: SourceVariant,
}

/// Parameters for [`BlockKind::InputPort`] / [`BlockKind::OutputPort`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortBlockParams {
    /// The external port name (struct field name at codegen time).
    pub port_name: Ident,
    /// The declared signal type.
    pub signal_type: SignalType,
}

/// Parameters for [`BlockKind::Sum`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumParams {
    /// One `+`/`-` character per input, selecting its sign.
    pub signs: String,
}

/// Parameters for [`BlockKind::Multiply`] and several fixed-arity blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplyParams {
    /// Number of input ports.
    pub input_count: u32,
}

/// Parameters for [`BlockKind::Scale`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleParams {
    /// The scalar gain `k` in `y = k * x`.
    pub gain: f64,
}

/// The unary math operation for [`BlockKind::Trig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrigOp {
    /// `sin`.
    Sin,
    /// `cos`.
    Cos,
    /// `tan`.
    Tan,
    /// `asin`.
    Asin,
    /// `acos`.
    Acos,
    /// `atan`.
    Atan,
    /// `atan2` (binary; takes two inputs).
    Atan2,
}

/// Parameters for [`BlockKind::Trig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrigParams {
    /// Which math function to apply.
    pub op: TrigOp,
}

/// Parameters for [`BlockKind::Evaluate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateParams {
    /// The C99 expression source text.
    pub expression: String,
    /// Number of scalar `double` inputs the expression may reference via `in(k)`.
    pub input_count: u32,
    /// Source span of the expression text, for diagnostics.
    pub span: Span,
}

/// Parameters for [`BlockKind::TransferFunction`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFunctionParams {
    /// Numerator coefficients, highest order first. Degree `< denominator.len() - 1`.
    pub numerator: Vec<f64>,
    /// Denominator coefficients, highest order first. Non-empty; leading coefficient non-zero.
    pub denominator: Vec<f64>,
    /// The signal type the transfer function is applied to (broadcast per element).
    pub signal_type: SignalType,
}

impl TransferFunctionParams {
    /// The order `n` of the denominator polynomial; the number of continuous states
    /// per element. `n == 0` means the block degenerates to a scalar gain.
    pub fn order(&self) -> usize {
        self.denominator.len().saturating_sub(1)
    }
}

/// Extrapolation policy for lookup-table blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extrapolation {
    /// Clamp to the nearest table edge.
    Clamp,
    /// Linearly extend the boundary segment's slope.
    Extrapolate,
}

/// Parameters for [`BlockKind::Lookup1d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lookup1dParams {
    /// Sorted breakpoint inputs.
    pub breakpoints: Vec<f64>,
    /// Table outputs, one per breakpoint.
    pub table_data: Vec<f64>,
    /// Behavior outside the breakpoint range.
    pub extrapolation: Extrapolation,
}

/// Parameters for [`BlockKind::Lookup2d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lookup2dParams {
    /// Sorted row breakpoints.
    pub row_breakpoints: Vec<f64>,
    /// Sorted column breakpoints.
    pub col_breakpoints: Vec<f64>,
    /// Row-major table data, `row_breakpoints.len() * col_breakpoints.len()` entries.
    pub table_data: Vec<f64>,
    /// Behavior outside the breakpoint range.
    pub extrapolation: Extrapolation,
}

/// Parameters for [`BlockKind::Mux`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxParams {
    /// Number of rows in the assembled vector/matrix.
    pub rows: u32,
    /// Number of columns in the assembled vector/matrix.
    pub cols: u32,
    /// The common base type of every scalar input.
    pub base: crate::types::BaseType,
}

/// Parameters for [`BlockKind::Demux`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemuxParams {
    /// The input signal type being split into scalars.
    pub input_type: SignalType,
}

/// The comparator used by [`BlockKind::Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// `>`.
    Greater,
    /// `>=`.
    GreaterEq,
    /// `<`.
    Less,
    /// `<=`.
    LessEq,
    /// `==`.
    Equal,
    /// `!=`.
    NotEqual,
}

/// Parameters for [`BlockKind::Condition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionParams {
    /// The comparator applied against `value`.
    pub comparator: Comparator,
    /// The literal compared against the scalar input.
    pub value: f64,
}

/// Buffer retention policy for display/logger blocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BufferPolicy {
    /// Retain the most recent `max_samples` samples.
    Ring {
        /// Maximum retained samples.
        max_samples: u32,
    },
    /// Retain every sample recorded during the run.
    Unbounded,
}

/// Parameters for [`BlockKind::SignalDisplay`] and [`BlockKind::SignalLogger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderParams {
    /// The sample retention policy.
    pub buffer: BufferPolicy,
}

/// Parameters for [`BlockKind::SheetLabelSink`] / [`BlockKind::SheetLabelSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLabelParams {
    /// The signal name used to match sinks with sources in the same scope.
    pub signal_name: Ident,
}

/// Parameters for [`BlockKind::Subsystem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemParams {
    /// The private, nested sheets owned by this subsystem.
    pub sheets: Vec<SheetId>,
    /// Declared input port names, in port-index order.
    pub input_ports: Vec<Ident>,
    /// Declared output port names, in port-index order.
    pub output_ports: Vec<Ident>,
    /// Whether port `-1` is a `bool` enable input.
    pub show_enable_input: bool,
}

/// The closed set of block kinds, each carrying its own tagged parameter record.
///
/// There is deliberately no free-form property bag at this layer: every
/// variant below is fully typed, even though the external wire format
/// (model serialization) may represent parameters dynamically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockKind {
    /// Emits a compile-time or time-varying constant.
    Source(SourceParams),
    /// Reads from the enclosing scope's external input record.
    InputPort(PortBlockParams),
    /// Writes to the enclosing scope's external output record.
    OutputPort(PortBlockParams),
    /// Elementwise signed sum of same-typed inputs.
    Sum(SumParams),
    /// Elementwise product of same-typed inputs.
    Multiply(MultiplyParams),
    /// `y = k * x` elementwise.
    Scale(ScaleParams),
    /// Scalar absolute value.
    Abs,
    /// Elementwise unary negation.
    Uminus,
    /// Unary or binary trigonometric math.
    Trig(TrigParams),
    /// Evaluates a C99 expression over scalar `double` inputs.
    Evaluate(EvaluateParams),
    /// A rational Laplace transfer function with continuous state.
    TransferFunction(TransferFunctionParams),
    /// 1-D linear-interpolation lookup table.
    Lookup1d(Lookup1dParams),
    /// 2-D bilinear-interpolation lookup table.
    Lookup2d(Lookup2dParams),
    /// Matrix/vector/scalar product per §4.3's shape table.
    MatrixMultiply,
    /// Vector-to-column-matrix or matrix transpose.
    Transpose,
    /// Assembles scalar inputs into a vector or matrix, row-major.
    Mux(MuxParams),
    /// Splits a vector or matrix into scalar outputs, row-major.
    Demux(DemuxParams),
    /// 2-D or 3-D vector cross product.
    Cross,
    /// Equal-length vector dot product.
    Dot,
    /// Euclidean magnitude of a vector input.
    Mag,
    /// Selects between two same-typed inputs by a scalar control value.
    If,
    /// Compares a scalar input against a literal, producing `bool`.
    Condition(ConditionParams),
    /// Zero-output sink recording samples for display.
    SignalDisplay(RecorderParams),
    /// Zero-output sink recording samples for the run's log.
    SignalLogger(RecorderParams),
    /// Absorbs one input wire under a named scope-local signal.
    SheetLabelSink(SheetLabelParams),
    /// Emits the value absorbed by the matching sink in the same scope.
    SheetLabelSource(SheetLabelParams),
    /// A nested hierarchical block owning its own private sheets.
    Subsystem(SubsystemParams),
}

impl BlockKind {
    /// A short, stable name for this kind, used in diagnostics and C identifier
    /// prefixes. Matches the external serialization's `type` field vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Source(_) => "source",
            BlockKind::InputPort(_) => "input_port",
            BlockKind::OutputPort(_) => "output_port",
            BlockKind::Sum(_) => "sum",
            BlockKind::Multiply(_) => "multiply",
            BlockKind::Scale(_) => "scale",
            BlockKind::Abs => "abs",
            BlockKind::Uminus => "uminus",
            BlockKind::Trig(_) => "trig",
            BlockKind::Evaluate(_) => "evaluate",
            BlockKind::TransferFunction(_) => "transfer_function",
            BlockKind::Lookup1d(_) => "lookup_1d",
            BlockKind::Lookup2d(_) => "lookup_2d",
            BlockKind::MatrixMultiply => "matrix_multiply",
            BlockKind::Transpose => "transpose",
            BlockKind::Mux(_) => "mux",
            BlockKind::Demux(_) => "demux",
            BlockKind::Cross => "cross",
            BlockKind::Dot => "dot",
            BlockKind::Mag => "mag",
            BlockKind::If => "if",
            BlockKind::Condition(_) => "condition",
            BlockKind::SignalDisplay(_) => "signal_display",
            BlockKind::SignalLogger(_) => "signal_logger",
            BlockKind::SheetLabelSink(_) => "sheet_label_sink",
            BlockKind::SheetLabelSource(_) => "sheet_label_source",
            BlockKind::Subsystem(_) => "subsystem",
        }
    }

    /// `true` if this kind owns continuous integration state (`transfer_function`
    /// with denominator order `>= 1`).
    pub fn is_stateful(&self) -> bool {
        matches!(self, BlockKind::TransferFunction(p) if p.order() >= 1)
    }
}

/// A 2-D canvas position, purely cosmetic for simulation/codegen purposes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

/// A single block in a sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// The unique ID of this block within its sheet.
    pub id: BlockId,
    /// The block's kind and parameters.
    pub kind: BlockKind,
    /// The user-facing block name; also the default C identifier stem.
    pub name: Ident,
    /// Canvas position.
    pub position: Position,
    /// Source span of the block declaration, for diagnostics.
    pub span: Span,
}

/// Rectangular bounds of a sheet's canvas.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extents {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// A connected graph of blocks and wires belonging to the top-level model
/// or to one subsystem's private scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    /// The unique ID of this sheet within the model.
    pub id: SheetId,
    /// The sheet name. The top-level sheet is named `"main"`.
    pub name: Ident,
    /// All blocks in this sheet.
    pub blocks: Arena<BlockId, Block>,
    /// All wires in this sheet.
    pub wires: Vec<Wire>,
    /// Canvas extents.
    pub extents: Extents,
}

impl Sheet {
    /// Looks up a block by ID, returning `None` if absent or from another sheet.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.try_get(id)
    }

    /// Returns every wire whose target matches `port`.
    pub fn wires_into(&self, port: PortAddr) -> impl Iterator<Item = &Wire> {
        self.wires.iter().filter(move |w| w.target_port == port)
    }
}

/// Global per-run simulation settings shared by every sheet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Fixed integration/algebraic step size `dt`.
    pub simulation_time_step: f64,
    /// Total simulated duration; the engine performs `floor(duration/dt)` steps.
    pub simulation_duration: f64,
}

/// A whole model: an ordered collection of sheets plus run settings.
///
/// The first sheet always has id `"main"`. Sheets belonging to a subsystem's
/// private scope are reachable only through that subsystem's
/// [`SubsystemParams::sheets`] list, not through `Model::sheets` directly
/// (`sheets` holds every sheet in the model, main and nested alike, addressed
/// by [`SheetId`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// The model's declared format version string.
    pub version: String,
    /// The model's display name.
    pub name: Ident,
    /// Every sheet in the model, keyed by [`SheetId`].
    pub sheets: Arena<SheetId, Sheet>,
    /// The top-level sheet's ID.
    pub main_sheet: SheetId,
    /// Run-wide simulation settings.
    pub global_settings: GlobalSettings,
}

impl Model {
    /// Looks up a sheet by ID.
    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.try_get(id)
    }

    /// The top-level sheet.
    pub fn main(&self) -> &Sheet {
        self.sheets
            .try_get(self.main_sheet)
            .expect("main_sheet must reference a sheet owned by this model")
    }
}

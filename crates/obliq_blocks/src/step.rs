//! Per-kind algebraic evaluation: the value each block kind produces this
//! instant, given its current inputs (and, for the few kinds that need it,
//! current time or continuous state).
//!
//! State integration itself (the RK4 stepper for `transfer_function`) is the
//! simulator's responsibility; this module only exposes the pieces it
//! needs — [`crate::tf::Realization`] and the zero-state helpers below.

use obliq_common::{InternalError, XResult};
use obliq_ir::{BlockKind, Comparator, SignalType, SourceVariant, TrigOp};

use crate::evaluate::CompiledExpr;
use crate::tf;
use crate::value::Value;

/// What a block produced this step.
pub enum StepOutcome {
    /// The common case: one output port.
    Single(Value),
    /// `demux`'s row-major scalar outputs.
    Multi(Vec<Value>),
    /// A zero-output sink (`signal_display`, `signal_logger`,
    /// `sheet_label_sink`).
    None,
}

/// Evaluates a block kind's algebraic output.
///
/// `inputs` are this block's input ports in port-index order. `time` is the
/// current simulation time, used only by `source`. `evaluate_expr` is the
/// block's pre-parsed expression body, required (and only used) for
/// [`BlockKind::Evaluate`]. `tf_state` is the current continuous state, one
/// vector per signal element, required (and only used) for a stateful
/// [`BlockKind::TransferFunction`] (`order() >= 1`).
///
/// `input_port` is not handled here: its value comes from the external
/// input record, supplied directly by the caller rather than computed.
pub fn step(
    kind: &BlockKind,
    inputs: &[Value],
    time: f64,
    evaluate_expr: Option<&CompiledExpr>,
    tf_state: Option<&[Vec<f64>]>,
) -> XResult<StepOutcome> {
    match kind {
        BlockKind::Source(p) => {
            let sample = source_sample(&p.variant, time);
            Ok(StepOutcome::Single(broadcast(&p.output_type, sample)))
        }
        BlockKind::InputPort(_) => Err(InternalError::new(
            "input_port has no algebraic definition; its value comes from the external input record",
        )),
        BlockKind::OutputPort(_) => {
            // Zero declared outputs (it writes the external output record),
            // but the value it received is exactly what the caller needs to
            // record there.
            Ok(StepOutcome::Single(require_one(inputs)?.clone()))
        }
        BlockKind::Sum(p) => {
            require_at_least(inputs, 1)?;
            let signs: Vec<f64> = p.signs.chars().map(|c| if c == '-' { -1.0 } else { 1.0 }).collect();
            if signs.len() != inputs.len() {
                return Err(InternalError::new("sum: signs length does not match input count"));
            }
            let mut acc = inputs[0].map(|x| x * signs[0]);
            for (input, sign) in inputs.iter().zip(signs.iter()).skip(1) {
                let sign = *sign;
                acc = acc.zip_map(input, |a, b| a + sign * b)?;
            }
            Ok(StepOutcome::Single(acc))
        }
        BlockKind::Multiply(_) => {
            require_at_least(inputs, 1)?;
            let mut acc = inputs[0].clone();
            for input in &inputs[1..] {
                acc = acc.zip_map(input, |a, b| a * b)?;
            }
            Ok(StepOutcome::Single(acc))
        }
        BlockKind::Scale(p) => Ok(StepOutcome::Single(require_one(inputs)?.map(|x| x * p.gain))),
        BlockKind::Abs => Ok(StepOutcome::Single(require_one(inputs)?.map(f64::abs))),
        BlockKind::Uminus => Ok(StepOutcome::Single(require_one(inputs)?.map(|x| -x))),
        BlockKind::Trig(p) => {
            let value = match p.op {
                TrigOp::Atan2 => {
                    if inputs.len() != 2 {
                        return Err(InternalError::new("atan2 requires exactly two inputs"));
                    }
                    inputs[0].as_scalar()?.atan2(inputs[1].as_scalar()?)
                }
                op => apply_trig(op, require_one(inputs)?.as_scalar()?),
            };
            Ok(StepOutcome::Single(Value::Scalar(value)))
        }
        BlockKind::Evaluate(_) => {
            let compiled = evaluate_expr
                .ok_or_else(|| InternalError::new("evaluate block stepped without a compiled expression"))?;
            let scalars: XResult<Vec<f64>> = inputs.iter().map(Value::as_scalar).collect();
            Ok(StepOutcome::Single(Value::Scalar(compiled.run(&scalars?)?)))
        }
        BlockKind::TransferFunction(p) => {
            let x = require_one(inputs)?;
            if p.order() == 0 {
                let gain = tf::static_gain(p)?;
                Ok(StepOutcome::Single(x.map(|v| v * gain)))
            } else {
                let states = tf_state
                    .ok_or_else(|| InternalError::new("stateful transfer_function stepped without state"))?;
                let realization = tf::Realization::new(p)?;
                if states.len() != x.element_count() {
                    return Err(InternalError::new("transfer_function: state/element count mismatch"));
                }
                let outputs: Vec<f64> = states.iter().map(|s| realization.output(s)).collect();
                Ok(StepOutcome::Single(x.reshape_like(outputs)))
            }
        }
        BlockKind::Lookup1d(p) => {
            let x = require_one(inputs)?.as_scalar()?;
            Ok(StepOutcome::Single(Value::Scalar(lookup_1d(&p.breakpoints, &p.table_data, p.extrapolation, x)?)))
        }
        BlockKind::Lookup2d(p) => {
            if inputs.len() != 2 {
                return Err(InternalError::new("lookup_2d requires exactly two inputs"));
            }
            let row = inputs[0].as_scalar()?;
            let col = inputs[1].as_scalar()?;
            Ok(StepOutcome::Single(Value::Scalar(lookup_2d(p, row, col)?)))
        }
        BlockKind::MatrixMultiply => {
            if inputs.len() != 2 {
                return Err(InternalError::new("matrix_multiply requires exactly two inputs"));
            }
            Ok(StepOutcome::Single(matrix_multiply(&inputs[0], &inputs[1])?))
        }
        BlockKind::Transpose => Ok(StepOutcome::Single(transpose(require_one(inputs)?))),
        BlockKind::Mux(p) => {
            let data: Vec<f64> = inputs.iter().map(Value::as_scalar).collect::<XResult<_>>()?;
            Value::assemble(p.rows as usize, p.cols as usize, data).map(StepOutcome::Single)
        }
        BlockKind::Demux(_) => {
            let outputs = require_one(inputs)?.elements().iter().map(|v| Value::Scalar(*v)).collect();
            Ok(StepOutcome::Multi(outputs))
        }
        BlockKind::Cross => {
            if inputs.len() != 2 {
                return Err(InternalError::new("cross requires exactly two inputs"));
            }
            Ok(StepOutcome::Single(cross(&inputs[0], &inputs[1])?))
        }
        BlockKind::Dot => {
            if inputs.len() != 2 {
                return Err(InternalError::new("dot requires exactly two inputs"));
            }
            let a = inputs[0].elements();
            let b = inputs[1].elements();
            if a.len() != b.len() {
                return Err(InternalError::new("dot: input length mismatch"));
            }
            let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
            Ok(StepOutcome::Single(Value::Scalar(sum)))
        }
        BlockKind::Mag => {
            let x = require_one(inputs)?;
            let sum_sq: f64 = x.elements().iter().map(|v| v * v).sum();
            Ok(StepOutcome::Single(Value::Scalar(sum_sq.sqrt())))
        }
        BlockKind::If => {
            if inputs.len() != 3 {
                return Err(InternalError::new("if requires exactly three inputs"));
            }
            let control = inputs[2].as_scalar()?;
            let chosen = if control != 0.0 { &inputs[1] } else { &inputs[0] };
            Ok(StepOutcome::Single(chosen.clone()))
        }
        BlockKind::Condition(p) => {
            let x = require_one(inputs)?.as_scalar()?;
            Ok(StepOutcome::Single(Value::bool(apply_comparator(p.comparator, x, p.value))))
        }
        BlockKind::SignalDisplay(_) | BlockKind::SignalLogger(_) | BlockKind::SheetLabelSink(_) => {
            Ok(StepOutcome::None)
        }
        BlockKind::SheetLabelSource(_) => {
            // Flattening already redirected every consumer of this block's
            // output to its matching sink's driver, so this value is never
            // actually read; see obliq_flatten's sheet-label resolution.
            Ok(StepOutcome::Single(Value::Scalar(0.0)))
        }
        BlockKind::Subsystem(_) => Err(InternalError::new(
            "subsystem block reached the step evaluator; it should have been eliminated by flattening",
        )),
    }
}

/// State count for `params`, `0` for a pure algebraic gain.
pub fn state_len(params: &obliq_ir::TransferFunctionParams) -> usize {
    params.order()
}

fn require_one(inputs: &[Value]) -> XResult<&Value> {
    match inputs {
        [v] => Ok(v),
        _ => Err(InternalError::new(format!("expected exactly one input, got {}", inputs.len()))),
    }
}

fn require_at_least(inputs: &[Value], n: usize) -> XResult<()> {
    if inputs.len() < n {
        return Err(InternalError::new(format!("expected at least {n} input(s), got {}", inputs.len())));
    }
    Ok(())
}

fn source_sample(variant: &SourceVariant, t: f64) -> f64 {
    match variant {
        SourceVariant::Constant { value } => *value,
        SourceVariant::Sine { amplitude, frequency, phase } => {
            amplitude * (2.0 * std::f64::consts::PI * frequency * t + phase).sin()
        }
        SourceVariant::Step { step_time, final_value } => {
            if t >= *step_time {
                *final_value
            } else {
                0.0
            }
        }
        SourceVariant::Ramp { slope, start_time } => {
            if t >= *start_time {
                slope * (t - start_time)
            } else {
                0.0
            }
        }
        SourceVariant::Unsupported { .. } => 0.0,
    }
}

fn broadcast(shape: &SignalType, v: f64) -> Value {
    match shape {
        SignalType::Scalar { .. } => Value::Scalar(v),
        SignalType::Vector { size, .. } => Value::Vector(vec![v; *size as usize]),
        SignalType::Matrix { rows, cols, .. } => {
            Value::Matrix { rows: *rows as usize, cols: *cols as usize, data: vec![v; (*rows * *cols) as usize] }
        }
    }
}

fn apply_trig(op: TrigOp, x: f64) -> f64 {
    match op {
        TrigOp::Sin => x.sin(),
        TrigOp::Cos => x.cos(),
        TrigOp::Tan => x.tan(),
        TrigOp::Asin => x.asin(),
        TrigOp::Acos => x.acos(),
        TrigOp::Atan => x.atan(),
        TrigOp::Atan2 => unreachable!("handled by the binary case in step()"),
    }
}

fn apply_comparator(c: Comparator, x: f64, value: f64) -> bool {
    match c {
        Comparator::Greater => x > value,
        Comparator::GreaterEq => x >= value,
        Comparator::Less => x < value,
        Comparator::LessEq => x <= value,
        Comparator::Equal => x == value,
        Comparator::NotEqual => x != value,
    }
}

fn lookup_1d(breakpoints: &[f64], table: &[f64], extrapolation: obliq_ir::Extrapolation, x: f64) -> XResult<f64> {
    if breakpoints.len() < 2 || breakpoints.len() != table.len() {
        return Err(InternalError::new("lookup_1d: malformed breakpoint/table data"));
    }
    if x <= breakpoints[0] {
        return Ok(extrapolate_edge(breakpoints, table, 0, 1, x, extrapolation));
    }
    let last = breakpoints.len() - 1;
    if x >= breakpoints[last] {
        return Ok(extrapolate_edge(breakpoints, table, last - 1, last, x, extrapolation));
    }
    for i in 0..last {
        if x >= breakpoints[i] && x <= breakpoints[i + 1] {
            return Ok(lerp(breakpoints[i], table[i], breakpoints[i + 1], table[i + 1], x));
        }
    }
    Err(InternalError::new("lookup_1d: input fell outside the sorted breakpoint range"))
}

fn extrapolate_edge(
    breakpoints: &[f64],
    table: &[f64],
    lo: usize,
    hi: usize,
    x: f64,
    extrapolation: obliq_ir::Extrapolation,
) -> f64 {
    match extrapolation {
        obliq_ir::Extrapolation::Clamp => {
            if x <= breakpoints[lo] {
                table[lo]
            } else {
                table[hi]
            }
        }
        obliq_ir::Extrapolation::Extrapolate => lerp(breakpoints[lo], table[lo], breakpoints[hi], table[hi], x),
    }
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn lookup_2d(p: &obliq_ir::Lookup2dParams, row: f64, col: f64) -> XResult<f64> {
    let rows = &p.row_breakpoints;
    let cols = &p.col_breakpoints;
    if rows.len() < 2 || cols.len() < 2 || p.table_data.len() != rows.len() * cols.len() {
        return Err(InternalError::new("lookup_2d: malformed breakpoint/table data"));
    }
    let (r0, r1, rt) = bracket(rows, row, p.extrapolation);
    let (c0, c1, ct) = bracket(cols, col, p.extrapolation);
    let at = |r: usize, c: usize| p.table_data[r * cols.len() + c];
    let top = at(r0, c0) + (at(r0, c1) - at(r0, c0)) * ct;
    let bottom = at(r1, c0) + (at(r1, c1) - at(r1, c0)) * ct;
    Ok(top + (bottom - top) * rt)
}

/// Finds the bracketing breakpoint indices for `x` and the fractional
/// position between them (clamped to `[0, 1]` under a `Clamp` policy).
fn bracket(breakpoints: &[f64], x: f64, extrapolation: obliq_ir::Extrapolation) -> (usize, usize, f64) {
    let last = breakpoints.len() - 1;
    if x <= breakpoints[0] {
        let t = match extrapolation {
            obliq_ir::Extrapolation::Clamp => 0.0,
            obliq_ir::Extrapolation::Extrapolate => (x - breakpoints[0]) / (breakpoints[1] - breakpoints[0]),
        };
        return (0, 1, t);
    }
    if x >= breakpoints[last] {
        let t = match extrapolation {
            obliq_ir::Extrapolation::Clamp => 1.0,
            obliq_ir::Extrapolation::Extrapolate => {
                1.0 + (x - breakpoints[last]) / (breakpoints[last] - breakpoints[last - 1])
            }
        };
        return (last - 1, last, t);
    }
    for i in 0..last {
        if x >= breakpoints[i] && x <= breakpoints[i + 1] {
            let t = (x - breakpoints[i]) / (breakpoints[i + 1] - breakpoints[i]);
            return (i, i + 1, t);
        }
    }
    (0, 1, 0.0)
}

fn matrix_multiply(a: &Value, b: &Value) -> XResult<Value> {
    let (am, an) = a.shape();
    let (bm, bn) = b.shape();
    match (a, b) {
        // Matches `shape_matrix_multiply` in obliq_validate exactly: a scalar
        // may only appear as the *first* operand (scalar⊗scalar, scalar⊗M);
        // M⊗scalar and V⊗scalar are not in §4.3's shape table and are
        // already rejected by T202 before a model reaches this function.
        (Value::Scalar(s), other) => Ok(other.map(|v| v * s)),
        (Value::Vector(v), Value::Matrix { rows, cols, data }) if v.len() == *rows => {
            let mut out = vec![0.0; *cols];
            for (r, vr) in v.iter().enumerate() {
                for c in 0..*cols {
                    out[c] += vr * data[r * cols + c];
                }
            }
            Ok(Value::vector(out))
        }
        (Value::Matrix { rows, cols, data }, Value::Vector(v)) if *cols == v.len() => {
            let mut out = vec![0.0; *rows];
            for r in 0..*rows {
                out[r] = (0..*cols).map(|c| data[r * cols + c] * v[c]).sum();
            }
            Ok(Value::vector(out))
        }
        (Value::Matrix { rows: m, cols: n, data: ad }, Value::Matrix { rows: n2, cols: p, data: bd })
            if n == n2 =>
        {
            let mut out = vec![0.0; m * p];
            for r in 0..*m {
                for c in 0..*p {
                    out[r * p + c] = (0..*n).map(|k| ad[r * n + k] * bd[k * p + c]).sum();
                }
            }
            Ok(Value::Matrix { rows: *m, cols: *p, data: out })
        }
        _ => Err(InternalError::new(format!(
            "matrix_multiply: incompatible shapes {:?}x{:?} and {:?}x{:?}",
            am, an, bm, bn
        ))),
    }
}

fn transpose(v: &Value) -> Value {
    match v {
        Value::Scalar(s) => Value::Scalar(*s),
        Value::Vector(data) => Value::Matrix { rows: data.len(), cols: 1, data: data.clone() },
        Value::Matrix { rows, cols, data } => {
            let mut out = vec![0.0; data.len()];
            for r in 0..*rows {
                for c in 0..*cols {
                    out[c * rows + r] = data[r * cols + c];
                }
            }
            Value::Matrix { rows: *cols, cols: *rows, data: out }
        }
    }
}

fn cross(a: &Value, b: &Value) -> XResult<Value> {
    let av = a.elements();
    let bv = b.elements();
    match (av.len(), bv.len()) {
        (2, 2) => Ok(Value::Scalar(av[0] * bv[1] - av[1] * bv[0])),
        (3, 3) => Ok(Value::Vector(vec![
            av[1] * bv[2] - av[2] * bv[1],
            av[2] * bv[0] - av[0] * bv[2],
            av[0] * bv[1] - av[1] * bv[0],
        ])),
        _ => Err(InternalError::new("cross requires two 2-element or two 3-element vectors")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obliq_ir::{BaseType, ScaleParams, SumParams};

    #[test]
    fn sum_applies_signs_elementwise() {
        let kind = BlockKind::Sum(SumParams { signs: "+-".to_string() });
        let inputs = vec![Value::Scalar(5.0), Value::Scalar(2.0)];
        let out = step(&kind, &inputs, 0.0, None, None).unwrap();
        match out {
            StepOutcome::Single(Value::Scalar(v)) => assert_eq!(v, 3.0),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn scale_multiplies_by_gain() {
        let kind = BlockKind::Scale(ScaleParams { gain: 2.5 });
        let out = step(&kind, &[Value::Scalar(4.0)], 0.0, None, None).unwrap();
        match out {
            StepOutcome::Single(Value::Scalar(v)) => assert_eq!(v, 10.0),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn source_sine_at_zero_uses_phase() {
        let variant = SourceVariant::Sine { amplitude: 2.0, frequency: 1.0, phase: std::f64::consts::FRAC_PI_2 };
        assert!((source_sample(&variant, 0.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_1d_interpolates_linearly() {
        let y = lookup_1d(&[0.0, 10.0], &[0.0, 100.0], obliq_ir::Extrapolation::Clamp, 5.0).unwrap();
        assert_eq!(y, 50.0);
    }

    #[test]
    fn lookup_1d_clamps_outside_range() {
        let y = lookup_1d(&[0.0, 10.0], &[0.0, 100.0], obliq_ir::Extrapolation::Clamp, 20.0).unwrap();
        assert_eq!(y, 100.0);
    }

    #[test]
    fn matrix_times_vector_shapes_correctly() {
        let m = Value::Matrix { rows: 2, cols: 2, data: vec![1.0, 0.0, 0.0, 1.0] };
        let v = Value::Vector(vec![3.0, 4.0]);
        let out = matrix_multiply(&m, &v).unwrap();
        assert_eq!(out, Value::Vector(vec![3.0, 4.0]));
    }

    #[test]
    fn transpose_flips_matrix_dims() {
        let m = Value::Matrix { rows: 2, cols: 3, data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0] };
        let t = transpose(&m);
        assert_eq!(t, Value::Matrix { rows: 3, cols: 2, data: vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0] });
    }

    #[test]
    fn cross_of_3d_vectors() {
        let a = Value::Vector(vec![1.0, 0.0, 0.0]);
        let b = Value::Vector(vec![0.0, 1.0, 0.0]);
        assert_eq!(cross(&a, &b).unwrap(), Value::Vector(vec![0.0, 0.0, 1.0]));
    }

    #[test]
    fn if_selects_by_control() {
        let inputs = vec![Value::Scalar(1.0), Value::Scalar(2.0), Value::Scalar(1.0)];
        let out = step(&BlockKind::If, &inputs, 0.0, None, None).unwrap();
        match out {
            StepOutcome::Single(Value::Scalar(v)) => assert_eq!(v, 2.0),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn demux_splits_row_major() {
        let inputs = vec![Value::Matrix { rows: 2, cols: 2, data: vec![1.0, 2.0, 3.0, 4.0] }];
        let out = step(&BlockKind::Demux(obliq_ir::DemuxParams {
            input_type: SignalType::Matrix { base: BaseType::Double, rows: 2, cols: 2 },
        }), &inputs, 0.0, None, None).unwrap();
        match out {
            StepOutcome::Multi(v) => assert_eq!(v, vec![
                Value::Scalar(1.0), Value::Scalar(2.0), Value::Scalar(3.0), Value::Scalar(4.0)
            ]),
            _ => panic!("expected multi"),
        }
    }
}

//! Emits the shared algebraic body and the `step`/`derivatives` functions.
//!
//! One internal `eval` function computes every block's algebraic value from
//! a given time and state snapshot, shared by `step` (called once, at the
//! step's starting state) and `derivatives` (called once per RK4 stage on a
//! trial state) — mirroring `obliq_sim::kernel`'s `algebraic_pass`/
//! `derivative_all` split, which is the same shared-evaluator structure for
//! the same reason: every consumer of the flattened graph must walk it in
//! identical topological order (the design note behind
//! `obliq_sim::schedule::build_schedule`, reused here directly).

use std::collections::HashMap;
use std::fmt::Write as _;

use obliq_common::{Ident, InternalError, Interner};
use obliq_diagnostics::DiagnosticSink;
use obliq_expr::{emit as emit_expr, lex, ExprParser};
use obliq_flatten::FlattenedModel;
use obliq_ir::{BlockId, BlockKind, Comparator, PortAddr, Sheet, SignalType, TrigOp};
use obliq_source::FileId;

use crate::error::CodegenError;
use crate::ident::sanitize;
use crate::layout::Layout;
use crate::shapes::{self, Shape};

/// The generated bodies shared by the header and source emitters.
pub struct EmittedBody {
    /// `static void <model>_eval(...)`, the algebraic evaluator.
    pub eval_fn: String,
    /// `void <model>_step(model_t *model, double t, double dt)`.
    pub step_fn: String,
    /// `void <model>_derivatives(...)`; empty if the model has no state.
    pub derivatives_fn: String,
    /// RK4 helper functions over `states_t`; empty if stateless.
    pub rk4_helpers: String,
    /// `typedef struct {...} <model>_tf_inputs_t;`; empty if stateless.
    pub tf_inputs_typedef: String,
    pub needs_math: bool,
    pub needs_memcpy: bool,
}

struct Ctx<'a> {
    sheet: &'a Sheet,
    interner: &'a Interner,
    layout: &'a Layout,
    shapes: HashMap<BlockId, Shape>,
    exprs: HashMap<(BlockId, i32), String>,
    needs_math: bool,
    needs_memcpy: bool,
    scratch_counter: u32,
}

/// Emits the shared evaluator plus `step`/`derivatives`, named with
/// `model_prefix` (the sanitized, lowercased model name).
pub fn emit(
    model_prefix: &str,
    flattened: &FlattenedModel,
    interner: &Interner,
    layout: &Layout,
    sink: &DiagnosticSink,
) -> Result<EmittedBody, CodegenError> {
    let sheet = flattened.model.main();
    let schedule = obliq_sim::schedule::build_schedule(sheet, sink);

    let mut ctx = Ctx {
        sheet,
        interner,
        layout,
        shapes: HashMap::with_capacity(sheet.blocks.len()),
        exprs: HashMap::with_capacity(sheet.blocks.len()),
        needs_math: false,
        needs_memcpy: false,
        scratch_counter: 0,
    };

    let mut decls = String::new();
    let mut body = String::new();
    // (field_name, element_count) of every stateful transfer_function's
    // input driver, gathered as the eval walk reaches each one.
    let mut tf_driver_fields: Vec<(String, usize)> = Vec::new();

    for &block_id in &schedule {
        let block = ctx.sheet.block(block_id).ok_or_else(|| InternalError::new("scheduled block missing"))?;
        let shape = shapes::infer(ctx.sheet, block_id, &block.kind, &ctx.shapes)?;
        ctx.shapes.insert(block_id, shape);
        emit_block(&mut ctx, &mut decls, &mut body, block_id, &block.kind, &mut tf_driver_fields)?;
    }

    let stateful = layout.is_stateful();

    let tf_inputs_typedef = if stateful {
        let mut s = String::new();
        let _ = writeln!(s, "typedef struct {{");
        for slot in &layout.states {
            let _ = writeln!(s, "    double {}[{}];", slot.field_name, slot.element_count);
        }
        let _ = writeln!(s, "}} {model_prefix}_tf_inputs_t;");
        s
    } else {
        String::new()
    };

    let eval_fn = {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "static void {model_prefix}_eval(const {model_prefix}_t *model, double t, const {model_prefix}_states_t *state, {model_prefix}_outputs_t *out{tf_param})",
            tf_param = if stateful { format!(", {model_prefix}_tf_inputs_t *tf_in") } else { String::new() },
        );
        let _ = writeln!(s, "{{");
        let _ = writeln!(s, "    (void)state;");
        let _ = writeln!(s, "    (void)t;");
        if stateful {
            let _ = writeln!(s, "    (void)tf_in;");
        }
        s.push_str(&decls);
        s.push_str(&body);
        let _ = writeln!(s, "}}");
        s
    };

    let (rk4_helpers, derivatives_fn, step_fn) = if stateful {
        emit_stateful_step(model_prefix, layout, &tf_driver_fields)
    } else {
        (String::new(), String::new(), emit_stateless_step(model_prefix))
    };

    Ok(EmittedBody {
        eval_fn,
        step_fn,
        derivatives_fn,
        rk4_helpers,
        tf_inputs_typedef,
        needs_math: ctx.needs_math,
        needs_memcpy: ctx.needs_memcpy,
    })
}

fn emit_stateless_step(model_prefix: &str) -> String {
    format!(
        "void {model_prefix}_step({model_prefix}_t *model, double t, double dt) {{\n    (void)dt;\n    {model_prefix}_eval(model, t, NULL, &model->outputs);\n}}\n"
    )
}

fn emit_stateful_step(model_prefix: &str, layout: &Layout, tf_driver_fields: &[(String, usize)]) -> (String, String, String) {
    let mut helpers = String::new();
    let _ = writeln!(
        helpers,
        "static void {model_prefix}_offset_states({model_prefix}_states_t *out, const {model_prefix}_states_t *base, const {model_prefix}_states_t *deriv, double scale) {{"
    );
    for slot in &layout.states {
        let _ = writeln!(
            helpers,
            "    for (size_t e = 0; e < {ec}; e++) {{ for (size_t j = 0; j < {order}; j++) {{ out->{f}[e][j] = base->{f}[e][j] + scale * deriv->{f}[e][j]; }} }}",
            ec = slot.element_count,
            order = slot.order,
            f = slot.field_name,
        );
    }
    let _ = writeln!(helpers, "}}");

    let _ = writeln!(
        helpers,
        "static void {model_prefix}_combine_rk4({model_prefix}_states_t *out, const {model_prefix}_states_t *base, const {model_prefix}_states_t *k1, const {model_prefix}_states_t *k2, const {model_prefix}_states_t *k3, const {model_prefix}_states_t *k4, double dt) {{"
    );
    for slot in &layout.states {
        let _ = writeln!(
            helpers,
            "    for (size_t e = 0; e < {ec}; e++) {{ for (size_t j = 0; j < {order}; j++) {{ out->{f}[e][j] = base->{f}[e][j] + (dt / 6.0) * (k1->{f}[e][j] + 2.0 * k2->{f}[e][j] + 2.0 * k3->{f}[e][j] + k4->{f}[e][j]); }} }}",
            ec = slot.element_count,
            order = slot.order,
            f = slot.field_name,
        );
    }
    let _ = writeln!(helpers, "}}");

    let _ = writeln!(
        helpers,
        "static int {model_prefix}_states_finite(const {model_prefix}_states_t *s) {{"
    );
    for slot in &layout.states {
        let _ = writeln!(
            helpers,
            "    for (size_t e = 0; e < {ec}; e++) {{ for (size_t j = 0; j < {order}; j++) {{ if (!isfinite(s->{f}[e][j]) || fabs(s->{f}[e][j]) > 1e10) return 0; }} }}",
            ec = slot.element_count,
            order = slot.order,
            f = slot.field_name,
        );
    }
    let _ = writeln!(helpers, "    return 1;\n}}");

    let mut deriv = String::new();
    let _ = writeln!(
        deriv,
        "void {model_prefix}_derivatives(const {model_prefix}_t *model, double t, const {model_prefix}_states_t *state, {model_prefix}_states_t *deriv) {{"
    );
    let _ = writeln!(deriv, "    {model_prefix}_outputs_t scratch_outputs;");
    let _ = writeln!(deriv, "    {model_prefix}_tf_inputs_t tf_in;");
    let _ = writeln!(deriv, "    {model_prefix}_eval(model, t, state, &scratch_outputs, &tf_in);");
    for slot in &layout.states {
        let (_, count) = tf_driver_fields.iter().find(|(name, _)| name == &slot.field_name).cloned().unwrap_or((slot.field_name.clone(), slot.element_count));
        let (a, b) = realization_aligned(&slot.numerator, &slot.denominator, slot.order);
        let _ = writeln!(deriv, "    for (size_t e = 0; e < {count}; e++) {{");
        for i in 0..slot.order.saturating_sub(1) {
            let _ = writeln!(deriv, "        deriv->{}[e][{i}] = state->{}[e][{}];", slot.field_name, slot.field_name, i + 1);
        }
        let mut feedback = String::new();
        for (j, coeff) in a.iter().enumerate() {
            if j > 0 {
                feedback.push_str(" + ");
            }
            let _ = write!(feedback, "({}) * state->{}[e][{j}]", lit(*coeff), slot.field_name);
        }
        let _ = writeln!(
            deriv,
            "        deriv->{f}[e][{last}] = tf_in.{f}[e] - ({feedback});",
            f = slot.field_name,
            last = slot.order - 1,
        );
        let _ = writeln!(deriv, "    }}");
        let _ = b; // output coefficients; consumed by the eval emitter's output formula, not here.
    }
    let _ = writeln!(deriv, "}}");

    let mut step = String::new();
    let _ = writeln!(step, "void {model_prefix}_step({model_prefix}_t *model, double t, double dt) {{");
    let _ = writeln!(step, "    {model_prefix}_eval(model, t, &model->states, &model->outputs, NULL);");
    let _ = writeln!(step, "    {{");
    let _ = writeln!(step, "        {model_prefix}_states_t k1, k2, k3, k4, mid, end, next;");
    let _ = writeln!(step, "        {model_prefix}_derivatives(model, t, &model->states, &k1);");
    let _ = writeln!(step, "        {model_prefix}_offset_states(&mid, &model->states, &k1, dt / 2.0);");
    let _ = writeln!(step, "        {model_prefix}_derivatives(model, t + dt / 2.0, &mid, &k2);");
    let _ = writeln!(step, "        {model_prefix}_offset_states(&mid, &model->states, &k2, dt / 2.0);");
    let _ = writeln!(step, "        {model_prefix}_derivatives(model, t + dt / 2.0, &mid, &k3);");
    let _ = writeln!(step, "        {model_prefix}_offset_states(&end, &model->states, &k3, dt);");
    let _ = writeln!(step, "        {model_prefix}_derivatives(model, t + dt, &end, &k4);");
    let _ = writeln!(
        step,
        "        if ({p}_states_finite(&k1) && {p}_states_finite(&k2) && {p}_states_finite(&k3) && {p}_states_finite(&k4)) {{",
        p = model_prefix,
    );
    let _ = writeln!(step, "            {model_prefix}_combine_rk4(&next, &model->states, &k1, &k2, &k3, &k4, dt);");
    let _ = writeln!(step, "            model->states = next;");
    let _ = writeln!(step, "        }}");
    let _ = writeln!(step, "    }}");
    let _ = writeln!(step, "}}");

    (helpers, deriv, step)
}

/// Feedback/output coefficients aligned to the state index they multiply
/// (`a[j]`/`b[j]` multiply `x[j]`), re-deriving the same normalization
/// `obliq_blocks::tf::Realization` performs at runtime, computed once here
/// at code-generation time so the coefficients bake in as C literals.
fn realization_aligned(numerator: &[f64], denominator: &[f64], n: usize) -> (Vec<f64>, Vec<f64>) {
    let leading = denominator[0];
    let a_full: Vec<f64> = denominator[1..].iter().map(|c| c / leading).collect();
    let mut b_full = vec![0.0; n.saturating_sub(numerator.len())];
    b_full.extend(numerator.iter().map(|c| c / leading));
    let a_aligned: Vec<f64> = (0..n).map(|j| a_full[n - 1 - j]).collect();
    let b_aligned: Vec<f64> = (0..n).map(|j| b_full[n - 1 - j]).collect();
    (a_aligned, b_aligned)
}

fn lit(v: f64) -> String {
    if v.is_nan() {
        "(0.0 / 0.0)".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "(1.0 / 0.0)".to_string() } else { "(-1.0 / 0.0)".to_string() }
    } else {
        format!("{v:?}")
    }
}

/// `(loop_preamble, index_suffix, loop_postamble)` for walking every element
/// of `shape`.
fn for_each_element(shape: &SignalType) -> (String, String, String) {
    match shape {
        SignalType::Scalar { .. } => (String::new(), String::new(), String::new()),
        SignalType::Vector { size, .. } => (
            format!("        for (size_t i = 0; i < {size}; i++) {{\n"),
            "[i]".to_string(),
            "        }\n".to_string(),
        ),
        SignalType::Matrix { rows, cols, .. } => (
            format!("        for (size_t r = 0; r < {rows}; r++) {{\n            for (size_t c = 0; c < {cols}; c++) {{\n"),
            "[r][c]".to_string(),
            "            }\n        }\n".to_string(),
        ),
    }
}

/// A base pointer expression such that `{base}[i]` visits every element of
/// `expr` (of shape `shape`) in flat, row-major order.
fn elem_base(expr: &str, shape: &SignalType) -> String {
    match shape {
        SignalType::Scalar { .. } => format!("(&{expr})"),
        SignalType::Vector { .. } => expr.to_string(),
        SignalType::Matrix { .. } => format!("((const double *){expr})"),
    }
}

fn declare_local(shape: &SignalType, name: &str) -> String {
    crate::ctype::declare_field(name, shape)
}

fn input_expr(ctx: &mut Ctx, target: PortAddr) -> Result<String, CodegenError> {
    let wire = ctx
        .sheet
        .wires_into(target)
        .next()
        .ok_or_else(|| InternalError::new(format!("{target:?} has no driving wire")))?;
    ctx.exprs
        .get(&(wire.source_port.block, wire.source_port.index))
        .cloned()
        .ok_or_else(|| InternalError::new("driving block's expression not yet emitted").into())
}

fn block_name(ctx: &Ctx, block_id: BlockId) -> String {
    ctx.layout.name_of(block_id).to_string()
}

fn resolve(ctx: &Interner, ident: Ident) -> String {
    ctx.resolve(ident).to_string()
}

#[allow(clippy::too_many_arguments)]
fn emit_block(
    ctx: &mut Ctx,
    decls: &mut String,
    body: &mut String,
    block_id: BlockId,
    kind: &BlockKind,
    tf_driver_fields: &mut Vec<(String, usize)>,
) -> Result<(), CodegenError> {
    let name = block_name(ctx, block_id);
    let shape = match ctx.shapes.get(&block_id) {
        Some(Shape::Single(s)) => Some(*s),
        _ => None,
    };

    match kind {
        BlockKind::InputPort(p) => {
            // Through-wire semantics: an interior input_port driven by a
            // wire aliases that wire's value with no statement of its own;
            // only a true top-level input_port reads the external record.
            let expr = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next() {
                Some(wire) => ctx
                    .exprs
                    .get(&(wire.source_port.block, wire.source_port.index))
                    .cloned()
                    .ok_or_else(|| InternalError::new("input_port's driving expression not yet emitted"))?,
                None => format!("model->inputs.{}", sanitize(&resolve(ctx.interner, p.port_name))),
            };
            ctx.exprs.insert((block_id, 0), expr);
            return Ok(());
        }
        BlockKind::OutputPort(p) => {
            let field_name = sanitize(&resolve(ctx.interner, p.port_name));
            let in_expr = input_expr(ctx, PortAddr::new(block_id, 0))?;
            match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)).and_then(|s| match s {
                Shape::Single(t) => Some(*t),
                _ => None,
            }) {
                Some(SignalType::Scalar { .. }) | None => {
                    let _ = writeln!(body, "    model->outputs.{field_name} = {in_expr};");
                }
                Some(_) => {
                    ctx.needs_memcpy = true;
                    let _ = writeln!(body, "    memcpy(model->outputs.{field_name}, {in_expr}, sizeof(model->outputs.{field_name}));");
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let shape = shape.unwrap_or(SignalType::Scalar { base: obliq_ir::BaseType::Double });

    match kind {
        BlockKind::Source(p) => {
            decls.push_str(&declare_local(&shape, &name));
            let sample_expr = source_sample_expr(p, ctx);
            emit_fill(body, &shape, &name, &sample_expr);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Sum(p) => {
            let inputs: Vec<String> = (0..p.signs.chars().count())
                .map(|i| input_expr(ctx, PortAddr::new(block_id, i as i32)))
                .collect::<Result<_, _>>()?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            let mut expr = String::new();
            for (i, (sign, inp)) in p.signs.chars().zip(inputs.iter()).enumerate() {
                if i == 0 {
                    if sign == '-' {
                        expr.push('-');
                    }
                } else {
                    expr.push_str(if sign == '-' { " - " } else { " + " });
                }
                let _ = write!(expr, "{inp}{suf}");
            }
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = {expr};");
            body.push_str(&post);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Multiply(p) => {
            let inputs: Vec<String> = (0..p.input_count).map(|i| input_expr(ctx, PortAddr::new(block_id, i as i32))).collect::<Result<_, _>>()?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            let expr = inputs.iter().map(|inp| format!("{inp}{suf}")).collect::<Vec<_>>().join(" * ");
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = {expr};");
            body.push_str(&post);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Scale(p) => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = ({}) * {in0}{suf};", lit(p.gain));
            body.push_str(&post);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Abs => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = fabs({in0}{suf});");
            body.push_str(&post);
            ctx.needs_math = true;
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Uminus => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = -{in0}{suf};");
            body.push_str(&post);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Trig(p) => {
            decls.push_str(&declare_local(&shape, &name));
            ctx.needs_math = true;
            let expr = if p.op == TrigOp::Atan2 {
                let a = input_expr(ctx, PortAddr::new(block_id, 0))?;
                let b = input_expr(ctx, PortAddr::new(block_id, 1))?;
                format!("atan2({a}, {b})")
            } else {
                let a = input_expr(ctx, PortAddr::new(block_id, 0))?;
                let f = match p.op {
                    TrigOp::Sin => "sin",
                    TrigOp::Cos => "cos",
                    TrigOp::Tan => "tan",
                    TrigOp::Asin => "asin",
                    TrigOp::Acos => "acos",
                    TrigOp::Atan => "atan",
                    TrigOp::Atan2 => unreachable!(),
                };
                format!("{f}({a})")
            };
            let _ = writeln!(body, "    {name} = {expr};");
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Evaluate(p) => {
            decls.push_str(&declare_local(&shape, &name));
            let sink = DiagnosticSink::new();
            let tokens = lex(&p.expression, FileId::DUMMY, &sink);
            let ast = ExprParser::new(tokens, &p.expression, &sink).parse();
            if !sink.take_all().is_empty() {
                return Err(InternalError::new(format!("evaluate block expression failed to parse: {:?}", p.expression)).into());
            }
            let mut input_exprs = Vec::with_capacity(p.input_count as usize);
            for i in 0..p.input_count {
                input_exprs.push(input_expr(ctx, PortAddr::new(block_id, i as i32))?);
            }
            let emitted = emit_expr(&ast, &p.expression, |k| input_exprs.get(k).cloned().unwrap_or_else(|| "0.0".to_string()));
            ctx.needs_math |= emitted.needs_math;
            let _ = writeln!(body, "    {name} = {};", emitted.source);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::TransferFunction(p) => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            if p.order() == 0 {
                let denom = p.denominator.first().copied().unwrap_or(1.0);
                let numer = p.numerator.first().copied().unwrap_or(0.0);
                let gain = numer / denom;
                let (pre, suf, post) = for_each_element(&shape);
                body.push_str(&pre);
                let _ = writeln!(body, "        {name}{suf} = ({}) * {in0}{suf};", lit(gain));
                body.push_str(&post);
            } else {
                let element_count = p.signal_type.element_count();
                let (a, b) = realization_aligned(&p.numerator, &p.denominator, p.order());
                let _ = a;
                let _ = writeln!(body, "    for (size_t e = 0; e < {element_count}; e++) {{");
                let mut out_expr = String::new();
                for (j, coeff) in b.iter().enumerate() {
                    if j > 0 {
                        out_expr.push_str(" + ");
                    }
                    let _ = write!(out_expr, "({}) * state->{name}[e][{j}]", lit(*coeff));
                }
                match &shape {
                    SignalType::Scalar { .. } => {
                        let _ = writeln!(body, "        {name} = {out_expr};");
                    }
                    _ => {
                        let _ = writeln!(body, "        {}[e] = {out_expr};", elem_base(&name, &shape));
                    }
                }
                let _ = writeln!(body, "    }}");
                // Record the driving input's shape so `derivatives` can
                // gather it through the same eval walk (the placeholder
                // value itself is irrelevant to this block's own output,
                // which is a pure function of state; only its *shape*
                // matters for scheduling, per obliq_sim::schedule).
                let driver_shape = ctx
                    .sheet
                    .wires_into(PortAddr::new(block_id, 0))
                    .next()
                    .and_then(|w| ctx.shapes.get(&w.source_port.block))
                    .and_then(|s| match s {
                        Shape::Single(t) => Some(*t),
                        _ => None,
                    })
                    .unwrap_or(p.signal_type);
                let driver_base = elem_base(&in0, &driver_shape);
                let _ = writeln!(body, "    if (tf_in) {{ for (size_t e = 0; e < {element_count}; e++) {{ tf_in->{name}[e] = {driver_base}[e]; }} }}");
                tf_driver_fields.push((name.clone(), element_count));
            }
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Lookup1d(p) => {
            decls.push_str(&declare_local(&shape, &name));
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            emit_lookup_1d(body, &name, &in0, &p.breakpoints, &p.table_data, p.extrapolation);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Lookup2d(p) => {
            decls.push_str(&declare_local(&shape, &name));
            let row = input_expr(ctx, PortAddr::new(block_id, 0))?;
            let col = input_expr(ctx, PortAddr::new(block_id, 1))?;
            emit_lookup_2d(body, &name, &row, &col, p);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::MatrixMultiply => {
            let a_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("matrix_multiply: missing lhs shape").into()),
            };
            let b_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 1)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("matrix_multiply: missing rhs shape").into()),
            };
            let a = input_expr(ctx, PortAddr::new(block_id, 0))?;
            let b = input_expr(ctx, PortAddr::new(block_id, 1))?;
            decls.push_str(&declare_local(&shape, &name));
            emit_matrix_multiply(body, &name, &a, a_shape, &b, b_shape);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Transpose => {
            let in_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("transpose: missing input shape").into()),
            };
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            emit_transpose(body, &name, &in0, in_shape);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Mux(p) => {
            let count = (p.rows * p.cols) as usize;
            let inputs: Vec<String> = (0..count).map(|i| input_expr(ctx, PortAddr::new(block_id, i as i32))).collect::<Result<_, _>>()?;
            decls.push_str(&declare_local(&shape, &name));
            match &shape {
                SignalType::Scalar { .. } => {
                    let _ = writeln!(body, "    {name} = {};", inputs[0]);
                }
                SignalType::Vector { .. } => {
                    for (k, inp) in inputs.iter().enumerate() {
                        let _ = writeln!(body, "    {name}[{k}] = {inp};");
                    }
                }
                SignalType::Matrix { cols, .. } => {
                    for (k, inp) in inputs.iter().enumerate() {
                        let r = k / *cols as usize;
                        let c = k % *cols as usize;
                        let _ = writeln!(body, "    {name}[{r}][{c}] = {inp};");
                    }
                }
            }
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Demux(_) => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            let in_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("demux: missing input shape").into()),
            };
            let base = elem_base(&in0, &in_shape);
            let count = in_shape.element_count();
            for i in 0..count {
                ctx.exprs.insert((block_id, i as i32), format!("{base}[{i}]"));
            }
        }
        BlockKind::Cross => {
            let a_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("cross: missing lhs shape").into()),
            };
            let a = elem_base(&input_expr(ctx, PortAddr::new(block_id, 0))?, &a_shape);
            let b_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 1)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("cross: missing rhs shape").into()),
            };
            let b = elem_base(&input_expr(ctx, PortAddr::new(block_id, 1))?, &b_shape);
            decls.push_str(&declare_local(&shape, &name));
            if a_shape.element_count() == 2 {
                let _ = writeln!(body, "    {name} = {a}[0] * {b}[1] - {a}[1] * {b}[0];");
            } else {
                let _ = writeln!(body, "    {name}[0] = {a}[1] * {b}[2] - {a}[2] * {b}[1];");
                let _ = writeln!(body, "    {name}[1] = {a}[2] * {b}[0] - {a}[0] * {b}[2];");
                let _ = writeln!(body, "    {name}[2] = {a}[0] * {b}[1] - {a}[1] * {b}[0];");
            }
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Dot => {
            let a_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("dot: missing lhs shape").into()),
            };
            let n = a_shape.element_count();
            let a = elem_base(&input_expr(ctx, PortAddr::new(block_id, 0))?, &a_shape);
            let b = elem_base(&input_expr(ctx, PortAddr::new(block_id, 1))?, &a_shape);
            decls.push_str(&declare_local(&shape, &name));
            let _ = writeln!(body, "    {name} = 0.0;");
            let _ = writeln!(body, "    for (size_t i = 0; i < {n}; i++) {{ {name} += {a}[i] * {b}[i]; }}");
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Mag => {
            let a_shape = match ctx.sheet.wires_into(PortAddr::new(block_id, 0)).next().and_then(|w| ctx.shapes.get(&w.source_port.block)) {
                Some(Shape::Single(t)) => *t,
                _ => return Err(InternalError::new("mag: missing input shape").into()),
            };
            let n = a_shape.element_count();
            let a = elem_base(&input_expr(ctx, PortAddr::new(block_id, 0))?, &a_shape);
            decls.push_str(&declare_local(&shape, &name));
            let scratch = format!("__sumsq_{}", ctx.scratch_counter);
            ctx.scratch_counter += 1;
            let _ = writeln!(body, "    {{");
            let _ = writeln!(body, "        double {scratch} = 0.0;");
            let _ = writeln!(body, "        for (size_t i = 0; i < {n}; i++) {{ {scratch} += {a}[i] * {a}[i]; }}");
            let _ = writeln!(body, "        {name} = sqrt({scratch});");
            let _ = writeln!(body, "    }}");
            ctx.needs_math = true;
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::If => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            let in1 = input_expr(ctx, PortAddr::new(block_id, 1))?;
            let ctrl = input_expr(ctx, PortAddr::new(block_id, 2))?;
            decls.push_str(&declare_local(&shape, &name));
            let (pre, suf, post) = for_each_element(&shape);
            body.push_str(&pre);
            let _ = writeln!(body, "        {name}{suf} = ({ctrl} != 0.0) ? {in1}{suf} : {in0}{suf};");
            body.push_str(&post);
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::Condition(p) => {
            let in0 = input_expr(ctx, PortAddr::new(block_id, 0))?;
            decls.push_str(&declare_local(&shape, &name));
            let op = match p.comparator {
                Comparator::Greater => ">",
                Comparator::GreaterEq => ">=",
                Comparator::Less => "<",
                Comparator::LessEq => "<=",
                Comparator::Equal => "==",
                Comparator::NotEqual => "!=",
            };
            let _ = writeln!(body, "    {name} = ({in0} {op} ({}));", lit(p.value));
            ctx.exprs.insert((block_id, 0), name);
        }
        BlockKind::SignalDisplay(_) | BlockKind::SignalLogger(_) | BlockKind::SheetLabelSink(_) | BlockKind::SheetLabelSource(_) => {}
        BlockKind::InputPort(_) | BlockKind::OutputPort(_) => unreachable!("handled above"),
        BlockKind::Subsystem(_) => {
            return Err(InternalError::new("subsystem block survived flattening; cannot emit C for it").into())
        }
    }

    Ok(())
}

fn emit_fill(body: &mut String, shape: &SignalType, name: &str, scalar_expr: &str) {
    let (pre, suf, post) = for_each_element(shape);
    body.push_str(&pre);
    let _ = writeln!(body, "        {name}{suf} = {scalar_expr};");
    body.push_str(&post);
}

fn source_sample_expr(p: &obliq_ir::SourceParams, ctx: &mut Ctx) -> String {
    match &p.variant {
        obliq_ir::SourceVariant::Constant { value } => lit(*value),
        obliq_ir::SourceVariant::Sine { amplitude, frequency, phase } => {
            ctx.needs_math = true;
            let coeff = 2.0 * std::f64::consts::PI * frequency;
            format!("({}) * sin(({}) * t + ({}))", lit(*amplitude), lit(coeff), lit(*phase))
        }
        obliq_ir::SourceVariant::Step { step_time, final_value } => {
            format!("(t >= ({})) ? ({}) : 0.0", lit(*step_time), lit(*final_value))
        }
        obliq_ir::SourceVariant::Ramp { slope, start_time } => {
            format!("(t >= ({})) ? ({}) * (t - ({})) : 0.0", lit(*start_time), lit(*slope), lit(*start_time))
        }
        obliq_ir::SourceVariant::Unsupported { .. } => "0.0".to_string(),
    }
}

fn emit_lookup_1d(body: &mut String, name: &str, in_expr: &str, breakpoints: &[f64], table: &[f64], extrapolation: obliq_ir::Extrapolation) {
    let n = breakpoints.len();
    let bp_lits: Vec<String> = breakpoints.iter().map(|v| lit(*v)).collect();
    let tb_lits: Vec<String> = table.iter().map(|v| lit(*v)).collect();
    let _ = writeln!(body, "    {{");
    let _ = writeln!(body, "        static const double __bp[{n}] = {{ {} }};", bp_lits.join(", "));
    let _ = writeln!(body, "        static const double __tb[{n}] = {{ {} }};", tb_lits.join(", "));
    let _ = writeln!(body, "        double __x = {in_expr};");
    let _ = writeln!(body, "        double __y;");
    let _ = writeln!(body, "        if (__x <= __bp[0]) {{");
    let _ = writeln!(body, "            __y = {};", edge_expr(extrapolation, "__bp", "__tb", "0", "1"));
    let _ = writeln!(body, "        }} else if (__x >= __bp[{n} - 1]) {{");
    let _ = writeln!(body, "            __y = {};", edge_expr(extrapolation, "__bp", "__tb", &format!("{n} - 2"), &format!("{n} - 1")));
    let _ = writeln!(body, "        }} else {{");
    let _ = writeln!(body, "            __y = __tb[0];");
    let _ = writeln!(body, "            for (size_t __k = 0; __k + 1 < {n}; __k++) {{");
    let _ = writeln!(body, "                if (__x >= __bp[__k] && __x <= __bp[__k + 1]) {{");
    let _ = writeln!(body, "                    __y = {};", lerp_expr("__bp", "__tb", "__k", "__k + 1", "__x"));
    let _ = writeln!(body, "                    break;");
    let _ = writeln!(body, "                }}");
    let _ = writeln!(body, "            }}");
    let _ = writeln!(body, "        }}");
    let _ = writeln!(body, "        {name} = __y;");
    let _ = writeln!(body, "    }}");
}

fn edge_expr(extrapolation: obliq_ir::Extrapolation, bp: &str, tb: &str, lo: &str, hi: &str) -> String {
    match extrapolation {
        obliq_ir::Extrapolation::Clamp => format!("{tb}[{lo}]"),
        obliq_ir::Extrapolation::Extrapolate => lerp_expr(bp, tb, lo, hi, &format!("__x")),
    }
}

fn lerp_expr(bp: &str, tb: &str, lo: &str, hi: &str, x: &str) -> String {
    format!("{tb}[{lo}] + ({tb}[{hi}] - {tb}[{lo}]) * ({x} - {bp}[{lo}]) / ({bp}[{hi}] - {bp}[{lo}])")
}

fn emit_lookup_2d(body: &mut String, name: &str, row_expr: &str, col_expr: &str, p: &obliq_ir::Lookup2dParams) {
    let rn = p.row_breakpoints.len();
    let cn = p.col_breakpoints.len();
    let row_lits: Vec<String> = p.row_breakpoints.iter().map(|v| lit(*v)).collect();
    let col_lits: Vec<String> = p.col_breakpoints.iter().map(|v| lit(*v)).collect();
    let tbl_lits: Vec<String> = p.table_data.iter().map(|v| lit(*v)).collect();
    let _ = writeln!(body, "    {{");
    let _ = writeln!(body, "        static const double __rbp[{rn}] = {{ {} }};", row_lits.join(", "));
    let _ = writeln!(body, "        static const double __cbp[{cn}] = {{ {} }};", col_lits.join(", "));
    let _ = writeln!(body, "        static const double __tbl[{rn}][{cn}] = {{");
    for r in 0..rn {
        let row_slice = &tbl_lits[r * cn..(r + 1) * cn];
        let _ = writeln!(body, "            {{ {} }},", row_slice.join(", "));
    }
    let _ = writeln!(body, "        }};");
    emit_bracket(body, "__rbp", rn, row_expr, "__r0", "__r1", "__rt", p.extrapolation);
    emit_bracket(body, "__cbp", cn, col_expr, "__c0", "__c1", "__ct", p.extrapolation);
    let _ = writeln!(body, "        double __top = __tbl[__r0][__c0] + (__tbl[__r0][__c1] - __tbl[__r0][__c0]) * __ct;");
    let _ = writeln!(body, "        double __bottom = __tbl[__r1][__c0] + (__tbl[__r1][__c1] - __tbl[__r1][__c0]) * __ct;");
    let _ = writeln!(body, "        {name} = __top + (__bottom - __top) * __rt;");
    let _ = writeln!(body, "    }}");
}

#[allow(clippy::too_many_arguments)]
fn emit_bracket(body: &mut String, bp: &str, n: usize, x_expr: &str, lo_var: &str, hi_var: &str, t_var: &str, extrapolation: obliq_ir::Extrapolation) {
    let _ = writeln!(body, "        size_t {lo_var}, {hi_var};");
    let _ = writeln!(body, "        double {t_var};");
    let _ = writeln!(body, "        {{");
    let _ = writeln!(body, "            double __x = {x_expr};");
    let _ = writeln!(body, "            if (__x <= {bp}[0]) {{");
    let _ = writeln!(body, "                {lo_var} = 0; {hi_var} = 1;");
    match extrapolation {
        obliq_ir::Extrapolation::Clamp => {
            let _ = writeln!(body, "                {t_var} = 0.0;");
        }
        obliq_ir::Extrapolation::Extrapolate => {
            let _ = writeln!(body, "                {t_var} = (__x - {bp}[0]) / ({bp}[1] - {bp}[0]);");
        }
    }
    let _ = writeln!(body, "            }} else if (__x >= {bp}[{n} - 1]) {{");
    let _ = writeln!(body, "                {lo_var} = {n} - 2; {hi_var} = {n} - 1;");
    match extrapolation {
        obliq_ir::Extrapolation::Clamp => {
            let _ = writeln!(body, "                {t_var} = 1.0;");
        }
        obliq_ir::Extrapolation::Extrapolate => {
            let _ = writeln!(body, "                {t_var} = 1.0 + (__x - {bp}[{n} - 1]) / ({bp}[{n} - 1] - {bp}[{n} - 2]);");
        }
    }
    let _ = writeln!(body, "            }} else {{");
    let _ = writeln!(body, "                {lo_var} = 0; {hi_var} = 1; {t_var} = 0.0;");
    let _ = writeln!(body, "                for (size_t __k = 0; __k + 1 < {n}; __k++) {{");
    let _ = writeln!(body, "                    if (__x >= {bp}[__k] && __x <= {bp}[__k + 1]) {{");
    let _ = writeln!(body, "                        {lo_var} = __k; {hi_var} = __k + 1;");
    let _ = writeln!(body, "                        {t_var} = (__x - {bp}[__k]) / ({bp}[__k + 1] - {bp}[__k]);");
    let _ = writeln!(body, "                        break;");
    let _ = writeln!(body, "                    }}");
    let _ = writeln!(body, "                }}");
    let _ = writeln!(body, "            }}");
    let _ = writeln!(body, "        }}");
}

fn emit_matrix_multiply(body: &mut String, out: &str, a: &str, a_shape: SignalType, b: &str, b_shape: SignalType) {
    match (a_shape, b_shape) {
        (SignalType::Scalar { .. }, other) => {
            let (pre, suf, post) = for_each_element(&other);
            body.push_str(&pre);
            let _ = writeln!(body, "        {out}{suf} = ({a}) * {b}{suf};");
            body.push_str(&post);
        }
        (SignalType::Vector { size: n, .. }, SignalType::Matrix { cols: p, .. }) => {
            if p == 1 {
                let _ = writeln!(body, "    {out} = 0.0;");
                let _ = writeln!(body, "    for (size_t r = 0; r < {n}; r++) {{ {out} += {a}[r] * {b}[r][0]; }}");
            } else {
                let _ = writeln!(body, "    for (size_t c = 0; c < {p}; c++) {{");
                let _ = writeln!(body, "        {out}[c] = 0.0;");
                let _ = writeln!(body, "        for (size_t r = 0; r < {n}; r++) {{ {out}[c] += {a}[r] * {b}[r][c]; }}");
                let _ = writeln!(body, "    }}");
            }
        }
        (SignalType::Matrix { rows: m, cols: n, .. }, SignalType::Vector { .. }) => {
            if m == 1 {
                let _ = writeln!(body, "    {out} = 0.0;");
                let _ = writeln!(body, "    for (size_t c = 0; c < {n}; c++) {{ {out} += {a}[0][c] * {b}[c]; }}");
            } else {
                let _ = writeln!(body, "    for (size_t r = 0; r < {m}; r++) {{");
                let _ = writeln!(body, "        {out}[r] = 0.0;");
                let _ = writeln!(body, "        for (size_t c = 0; c < {n}; c++) {{ {out}[r] += {a}[r][c] * {b}[c]; }}");
                let _ = writeln!(body, "    }}");
            }
        }
        (SignalType::Matrix { rows: m, cols: n, .. }, SignalType::Matrix { cols: p, .. }) => {
            let _ = writeln!(body, "    for (size_t r = 0; r < {m}; r++) {{");
            let _ = writeln!(body, "        for (size_t c = 0; c < {p}; c++) {{");
            let _ = writeln!(body, "            {out}[r][c] = 0.0;");
            let _ = writeln!(body, "            for (size_t k = 0; k < {n}; k++) {{ {out}[r][c] += {a}[r][k] * {b}[k][c]; }}");
            let _ = writeln!(body, "        }}");
            let _ = writeln!(body, "    }}");
        }
        _ => {
            let _ = writeln!(body, "    /* unreachable: incompatible matrix_multiply operand shapes */");
        }
    }
}

fn emit_transpose(body: &mut String, out: &str, in_expr: &str, in_shape: SignalType) {
    match in_shape {
        SignalType::Scalar { .. } => {
            let _ = writeln!(body, "    {out} = {in_expr};");
        }
        SignalType::Vector { size: n, .. } => {
            let _ = writeln!(body, "    for (size_t r = 0; r < {n}; r++) {{ {out}[r][0] = {in_expr}[r]; }}");
        }
        SignalType::Matrix { rows, cols, .. } => {
            let _ = writeln!(body, "    for (size_t r = 0; r < {rows}; r++) {{");
            let _ = writeln!(body, "        for (size_t c = 0; c < {cols}; c++) {{ {out}[c][r] = {in_expr}[r][c]; }}");
            let _ = writeln!(body, "    }}");
        }
    }
}

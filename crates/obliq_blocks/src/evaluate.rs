//! Compiles an `evaluate` block's expression text once, so the simulator's
//! per-step hot path only walks an already-parsed [`Expr`] tree.

use obliq_common::{InternalError, XResult};
use obliq_diagnostics::DiagnosticSink;
use obliq_expr::{evaluate, lex, EvalError, Expr, ExprParser};
use obliq_ir::EvaluateParams;
use obliq_source::FileId;

/// A parsed `evaluate` block body, ready to be re-evaluated every step
/// without re-lexing or re-parsing.
pub struct CompiledExpr {
    expr: Expr,
    source: String,
}

impl CompiledExpr {
    /// Parses `params.expression`. A validated model's expression text
    /// already parsed cleanly during validation, so a parse failure here
    /// indicates a bug in this pipeline rather than a user error.
    pub fn compile(params: &EvaluateParams) -> XResult<Self> {
        let sink = DiagnosticSink::new();
        let tokens = lex(&params.expression, FileId::DUMMY, &sink);
        let expr = ExprParser::new(tokens, &params.expression, &sink).parse();
        if !sink.take_all().is_empty() {
            return Err(InternalError::new(format!(
                "evaluate block expression failed to parse: {:?}",
                params.expression
            )));
        }
        Ok(Self { expr, source: params.expression.clone() })
    }

    /// Evaluates the compiled expression against this step's scalar inputs.
    pub fn run(&self, inputs: &[f64]) -> XResult<f64> {
        evaluate(&self.expr, &self.source, inputs)
            .map_err(|e: EvalError| InternalError::new(format!("evaluate block runtime error: {e}")))
    }
}

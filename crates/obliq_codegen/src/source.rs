//! Emits the generated `.c` source: `init`, the shared algebraic evaluator,
//! `step`, and (when the model has continuous state) `derivatives` plus its
//! RK4 helpers.

use std::fmt::Write as _;

use crate::body::EmittedBody;
use crate::layout::Layout;

/// Renders `<model_prefix>.c`'s full text.
pub fn emit(model_prefix: &str, header_name: &str, layout: &Layout, body: &EmittedBody) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "#include \"{header_name}\"");
    let _ = writeln!(s, "#include <math.h>");
    // init()'s memset needs this regardless of whether any block body
    // also generated a memcpy.
    let _ = writeln!(s, "#include <string.h>");
    s.push('\n');

    let _ = writeln!(s, "void {model_prefix}_init({model_prefix}_t *model) {{");
    let _ = writeln!(s, "    memset(model, 0, sizeof(*model));");
    let _ = writeln!(s, "}}");
    s.push('\n');

    s.push_str(&body.eval_fn);
    s.push('\n');

    if layout.is_stateful() {
        s.push_str(&body.tf_inputs_typedef);
        s.push('\n');
        s.push_str(&body.rk4_helpers);
        s.push('\n');
        s.push_str(&body.derivatives_fn);
        s.push('\n');
    }

    s.push_str(&body.step_fn);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty_layout() -> Layout {
        Layout { inputs: Vec::new(), outputs: Vec::new(), states: Vec::new(), block_names: HashMap::new(), uses_bool: false }
    }

    #[test]
    fn always_includes_math_and_string_headers() {
        let body = EmittedBody {
            eval_fn: String::new(),
            step_fn: String::new(),
            derivatives_fn: String::new(),
            rk4_helpers: String::new(),
            tf_inputs_typedef: String::new(),
            needs_math: true,
            needs_memcpy: false,
        };
        let text = emit("engine", "engine.h", &empty_layout(), &body);
        assert!(text.contains("#include <math.h>"));
        // init()'s memset needs <string.h> even when no block emitted a memcpy.
        assert!(text.contains("#include <string.h>"));
    }

    #[test]
    fn init_zeroes_the_whole_struct() {
        let body = EmittedBody {
            eval_fn: String::new(),
            step_fn: String::new(),
            derivatives_fn: String::new(),
            rk4_helpers: String::new(),
            tf_inputs_typedef: String::new(),
            needs_math: false,
            needs_memcpy: false,
        };
        let text = emit("engine", "engine.h", &empty_layout(), &body);
        assert!(text.contains("memset(model, 0, sizeof(*model));"));
    }
}

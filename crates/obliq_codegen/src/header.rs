//! Emits the generated header: `inputs_t`/`outputs_t`/`states_t`, the model
//! struct, and the public function prototypes.

use std::fmt::Write as _;

use crate::ctype::declare_field;
use crate::layout::Layout;

/// Renders `<model_prefix>.h`'s full text, guarded by `#ifndef <UPPER>_H`.
pub fn emit(model_prefix: &str, layout: &Layout) -> String {
    let guard = format!("{}_H", model_prefix.to_uppercase());
    let mut s = String::new();

    let _ = writeln!(s, "#ifndef {guard}");
    let _ = writeln!(s, "#define {guard}");
    s.push('\n');
    if layout.uses_bool {
        let _ = writeln!(s, "#include <stdbool.h>");
        s.push('\n');
    }

    let _ = writeln!(s, "typedef struct {{");
    for f in &layout.inputs {
        s.push_str(&declare_field(&f.name, &f.shape));
    }
    let _ = writeln!(s, "}} {model_prefix}_inputs_t;");
    s.push('\n');

    let _ = writeln!(s, "typedef struct {{");
    for f in &layout.outputs {
        s.push_str(&declare_field(&f.name, &f.shape));
    }
    let _ = writeln!(s, "}} {model_prefix}_outputs_t;");
    s.push('\n');

    if layout.is_stateful() {
        let _ = writeln!(s, "typedef struct {{");
        for slot in &layout.states {
            let _ = writeln!(s, "    double {}[{}][{}];", slot.field_name, slot.element_count, slot.order);
        }
        let _ = writeln!(s, "}} {model_prefix}_states_t;");
        s.push('\n');
    }

    let _ = writeln!(s, "typedef struct {{");
    let _ = writeln!(s, "    {model_prefix}_inputs_t inputs;");
    let _ = writeln!(s, "    {model_prefix}_outputs_t outputs;");
    if layout.is_stateful() {
        let _ = writeln!(s, "    {model_prefix}_states_t states;");
    }
    let _ = writeln!(s, "}} {model_prefix}_t;");
    s.push('\n');

    let _ = writeln!(s, "void {model_prefix}_init({model_prefix}_t *model);");
    let _ = writeln!(s, "void {model_prefix}_step({model_prefix}_t *model, double t, double dt);");
    if layout.is_stateful() {
        let _ = writeln!(
            s,
            "void {model_prefix}_derivatives(const {model_prefix}_t *model, double t, const {model_prefix}_states_t *state, {model_prefix}_states_t *deriv);"
        );
    }
    s.push('\n');
    let _ = writeln!(s, "#endif /* {guard} */");
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Field;
    use obliq_ir::{BaseType, SignalType};
    use std::collections::HashMap;

    fn stateless_layout() -> Layout {
        Layout {
            inputs: vec![Field { name: "throttle".into(), shape: SignalType::Scalar { base: BaseType::Double } }],
            outputs: vec![Field { name: "speed".into(), shape: SignalType::Scalar { base: BaseType::Double } }],
            states: Vec::new(),
            block_names: HashMap::new(),
            uses_bool: false,
        }
    }

    #[test]
    fn emits_a_guarded_header_with_no_states_struct_when_stateless() {
        let text = emit("engine", &stateless_layout());
        assert!(text.starts_with("#ifndef ENGINE_H\n#define ENGINE_H\n"));
        assert!(text.contains("typedef struct {\n    double throttle;\n} engine_inputs_t;"));
        assert!(text.contains("typedef struct {\n    double speed;\n} engine_outputs_t;"));
        assert!(!text.contains("engine_states_t"));
        assert!(text.contains("void engine_init(engine_t *model);"));
        assert!(text.contains("void engine_step(engine_t *model, double t, double dt);"));
        assert!(!text.contains("derivatives"));
        assert!(text.trim_end().ends_with("#endif /* ENGINE_H */"));
    }

    #[test]
    fn includes_stdbool_only_when_a_bool_field_is_present() {
        let mut layout = stateless_layout();
        layout.uses_bool = true;
        assert!(emit("engine", &layout).contains("#include <stdbool.h>"));
        assert!(!emit("engine", &stateless_layout()).contains("stdbool"));
    }
}

//! Library-properties text record: metadata describing the generated
//! artifact, rendered as a flat `key = value` text block.
//!
//! Styled after `aion_xray`'s FASM emitter: an ordered list of entries built
//! with plain `push`/`writeln!` and rendered in insertion order (unlike
//! FASM's alphabetical sort, metadata order matters to a human reader here).

use std::fmt::Write as _;

use crate::layout::Layout;

/// One `key = value` line in the rendered properties text.
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// An ordered collection of properties entries.
#[derive(Default)]
pub struct Properties {
    entries: Vec<Entry>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Entry { key: key.into(), value: value.into() });
    }

    /// Renders every entry as `key = value`, one per line, insertion order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(out, "{} = {}", e.key, e.value);
        }
        out
    }
}

/// Builds the library-properties text for `model_prefix`.
pub fn emit(model_prefix: &str, layout: &Layout, standard: &str) -> String {
    let mut p = Properties::new();
    p.push("name", model_prefix);
    p.push("language", "C99");
    p.push("standard", standard);
    p.push("input_count", layout.inputs.len().to_string());
    p.push("output_count", layout.outputs.len().to_string());
    p.push("stateful", layout.is_stateful().to_string());
    if layout.is_stateful() {
        let total_states: usize = layout.states.iter().map(|s| s.element_count * s.order).sum();
        p.push("transfer_function_count", layout.states.len().to_string());
        p.push("total_state_count", total_states.to_string());
    }
    p.push("header", format!("{model_prefix}.h"));
    p.push("source", format!("{model_prefix}.c"));
    p.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn entries_render_in_insertion_order() {
        let mut p = Properties::new();
        p.push("b", "2");
        p.push("a", "1");
        assert_eq!(p.render(), "b = 2\na = 1\n");
    }

    #[test]
    fn emits_model_metadata() {
        let layout = Layout { inputs: Vec::new(), outputs: Vec::new(), states: Vec::new(), block_names: HashMap::new(), uses_bool: false };
        let text = emit("engine", &layout, "c99");
        assert!(text.contains("name = engine"));
        assert!(text.contains("language = C99"));
        assert!(text.contains("standard = c99"));
        assert!(text.contains("stateful = false"));
        assert!(!text.contains("transfer_function_count"));
    }
}

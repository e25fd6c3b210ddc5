//! Maps [`SignalType`] onto C99 declarations.

use obliq_ir::{BaseType, SignalType};

/// Declares a struct member of `shape` named `field_name`, e.g.
/// `    double gain;\n`, `    double x[3];\n`, `    double a[2][3];\n`.
pub fn declare_field(field_name: &str, shape: &SignalType) -> String {
    match shape {
        SignalType::Scalar { base } => format!("    {} {};\n", base.c_keyword(), field_name),
        SignalType::Vector { base, size } => format!("    {} {}[{size}];\n", base.c_keyword(), field_name),
        SignalType::Matrix { base, rows, cols } => {
            format!("    {} {}[{rows}][{cols}];\n", base.c_keyword(), field_name)
        }
    }
}

/// `true` if any element of `shape` is `bool`, requiring `<stdbool.h>`.
pub fn uses_bool(shape: &SignalType) -> bool {
    shape.base() == BaseType::Bool
}

/// The scalar element type's C keyword, regardless of `shape`'s arity.
pub fn element_keyword(shape: &SignalType) -> &'static str {
    shape.base().c_keyword()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_a_scalar_field() {
        assert_eq!(declare_field("gain", &SignalType::Scalar { base: BaseType::Double }), "    double gain;\n");
    }

    #[test]
    fn declares_a_vector_field() {
        assert_eq!(
            declare_field("x", &SignalType::Vector { base: BaseType::Double, size: 3 }),
            "    double x[3];\n"
        );
    }

    #[test]
    fn declares_a_matrix_field() {
        assert_eq!(
            declare_field("a", &SignalType::Matrix { base: BaseType::Float, rows: 2, cols: 3 }),
            "    float a[2][3];\n"
        );
    }

    #[test]
    fn detects_bool_usage() {
        assert!(uses_bool(&SignalType::Scalar { base: BaseType::Bool }));
        assert!(!uses_bool(&SignalType::Scalar { base: BaseType::Double }));
    }
}

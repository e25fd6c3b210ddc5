//! Signal types: scalar/vector/matrix over a closed set of base numeric types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four numeric base types a signal can carry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BaseType {
    /// `bool`.
    Bool,
    /// `long` (C99 `long`; `int` is accepted as a parse-time synonym).
    Long,
    /// `float`.
    Float,
    /// `double`.
    Double,
}

impl BaseType {
    /// Parses a base type name, treating `int` as a synonym for `long`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bool" => Some(BaseType::Bool),
            "long" | "int" => Some(BaseType::Long),
            "float" => Some(BaseType::Float),
            "double" => Some(BaseType::Double),
            _ => None,
        }
    }

    /// The canonical C99 type keyword for this base type.
    pub fn c_keyword(self) -> &'static str {
        match self {
            BaseType::Bool => "bool",
            BaseType::Long => "long",
            BaseType::Float => "float",
            BaseType::Double => "double",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_keyword())
    }
}

/// A signal's type: scalar, a fixed-size vector, or a fixed-shape matrix,
/// each over one [`BaseType`].
///
/// Two types are compatible only when structurally equal — there is no
/// implicit widening between base types, nor between scalar/vector/matrix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SignalType {
    /// A single value of `base`.
    Scalar {
        /// The element base type.
        base: BaseType,
    },
    /// A fixed-length 1-D array of `size` elements of `base`, `size >= 1`.
    Vector {
        /// The element base type.
        base: BaseType,
        /// The number of elements.
        size: usize,
    },
    /// A fixed-shape 2-D array of `rows * cols` elements of `base`, both `>= 1`.
    Matrix {
        /// The element base type.
        base: BaseType,
        /// The number of rows.
        rows: usize,
        /// The number of columns.
        cols: usize,
    },
}

/// An error produced while parsing a [`SignalType`] from its string form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseTypeError {
    /// The base type name is not one of `bool`, `long`, `int`, `float`, `double`.
    #[error("unknown base type: {0}")]
    UnknownBase(String),
    /// A dimension is zero, negative, or not an integer.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    /// The string does not match the grammar `base ('[' N ']' ('[' M ']')?)?`.
    #[error("malformed type string: {0}")]
    Malformed(String),
}

impl SignalType {
    /// Parses `base ('[' N ']' ('[' M ']')?)?`, e.g. `"double"`, `"double[8]"`, `"double[3][4]"`.
    pub fn parse(s: &str) -> Result<Self, ParseTypeError> {
        let s = s.trim();
        let first_bracket = s.find('[');
        let (base_str, rest) = match first_bracket {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, ""),
        };
        let base = BaseType::parse(base_str.trim())
            .ok_or_else(|| ParseTypeError::UnknownBase(base_str.trim().to_string()))?;

        if rest.is_empty() {
            return Ok(SignalType::Scalar { base });
        }

        let dims = parse_dims(rest)?;
        match dims.len() {
            1 => Ok(SignalType::Vector { base, size: dims[0] }),
            2 => Ok(SignalType::Matrix {
                base,
                rows: dims[0],
                cols: dims[1],
            }),
            _ => Err(ParseTypeError::Malformed(s.to_string())),
        }
    }

    /// Renders this type back to its canonical string form.
    pub fn stringify(&self) -> String {
        match self {
            SignalType::Scalar { base } => base.to_string(),
            SignalType::Vector { base, size } => format!("{base}[{size}]"),
            SignalType::Matrix { base, rows, cols } => format!("{base}[{rows}][{cols}]"),
        }
    }

    /// Returns the base type shared by every element of this signal type.
    pub fn base(&self) -> BaseType {
        match self {
            SignalType::Scalar { base }
            | SignalType::Vector { base, .. }
            | SignalType::Matrix { base, .. } => *base,
        }
    }

    /// `true` for [`SignalType::Vector`].
    pub fn is_array(&self) -> bool {
        matches!(self, SignalType::Vector { .. })
    }

    /// `true` for [`SignalType::Matrix`].
    pub fn is_matrix(&self) -> bool {
        matches!(self, SignalType::Matrix { .. })
    }

    /// `true` for [`SignalType::Scalar`].
    pub fn is_scalar(&self) -> bool {
        matches!(self, SignalType::Scalar { .. })
    }

    /// The total number of scalar elements this type carries.
    pub fn element_count(&self) -> usize {
        match self {
            SignalType::Scalar { .. } => 1,
            SignalType::Vector { size, .. } => *size,
            SignalType::Matrix { rows, cols, .. } => rows * cols,
        }
    }

    /// Two types are compatible only when structurally equal; no widening.
    pub fn compatible(src: &SignalType, tgt: &SignalType) -> bool {
        src == tgt
    }
}

fn parse_dims(rest: &str) -> Result<Vec<usize>, ParseTypeError> {
    let mut dims = Vec::new();
    let mut chars = rest.trim();
    while !chars.is_empty() {
        if !chars.starts_with('[') {
            return Err(ParseTypeError::Malformed(rest.to_string()));
        }
        let close = chars
            .find(']')
            .ok_or_else(|| ParseTypeError::Malformed(rest.to_string()))?;
        let digits = &chars[1..close];
        let n: i64 = digits
            .trim()
            .parse()
            .map_err(|_| ParseTypeError::InvalidDimension(digits.to_string()))?;
        if n < 1 {
            return Err(ParseTypeError::InvalidDimension(digits.to_string()));
        }
        dims.push(n as usize);
        chars = chars[close + 1..].trim_start();
    }
    if dims.is_empty() || dims.len() > 2 {
        return Err(ParseTypeError::Malformed(rest.to_string()));
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scalar() {
        assert_eq!(
            SignalType::parse("double").unwrap(),
            SignalType::Scalar { base: BaseType::Double }
        );
    }

    #[test]
    fn parse_int_synonym_for_long() {
        assert_eq!(
            SignalType::parse("int").unwrap(),
            SignalType::Scalar { base: BaseType::Long }
        );
    }

    #[test]
    fn parse_vector() {
        assert_eq!(
            SignalType::parse("double[8]").unwrap(),
            SignalType::Vector { base: BaseType::Double, size: 8 }
        );
    }

    #[test]
    fn parse_matrix() {
        assert_eq!(
            SignalType::parse("double[3][4]").unwrap(),
            SignalType::Matrix { base: BaseType::Double, rows: 3, cols: 4 }
        );
    }

    #[test]
    fn reject_unknown_base() {
        assert!(matches!(
            SignalType::parse("decimal"),
            Err(ParseTypeError::UnknownBase(_))
        ));
    }

    #[test]
    fn reject_zero_size() {
        assert!(matches!(
            SignalType::parse("double[0]"),
            Err(ParseTypeError::InvalidDimension(_))
        ));
    }

    #[test]
    fn reject_negative_size() {
        assert!(matches!(
            SignalType::parse("double[-1]"),
            Err(ParseTypeError::InvalidDimension(_))
        ));
    }

    #[test]
    fn reject_non_integer_size() {
        assert!(matches!(
            SignalType::parse("double[1.5]"),
            Err(ParseTypeError::InvalidDimension(_))
        ));
    }

    #[test]
    fn stringify_roundtrip() {
        for s in ["bool", "long", "float", "double", "double[8]", "double[3][4]"] {
            let parsed = SignalType::parse(s).unwrap();
            assert_eq!(parsed.stringify(), s);
        }
    }

    #[test]
    fn element_counts() {
        assert_eq!(SignalType::parse("double").unwrap().element_count(), 1);
        assert_eq!(SignalType::parse("double[8]").unwrap().element_count(), 8);
        assert_eq!(SignalType::parse("double[3][4]").unwrap().element_count(), 12);
    }

    #[test]
    fn compatibility_is_structural_equality() {
        let a = SignalType::parse("double[3]").unwrap();
        let b = SignalType::parse("double[3]").unwrap();
        let c = SignalType::parse("float[3]").unwrap();
        assert!(SignalType::compatible(&a, &b));
        assert!(!SignalType::compatible(&a, &c));
    }

    #[test]
    fn is_array_is_matrix_is_scalar() {
        assert!(SignalType::parse("double").unwrap().is_scalar());
        assert!(SignalType::parse("double[8]").unwrap().is_array());
        assert!(SignalType::parse("double[3][4]").unwrap().is_matrix());
    }
}

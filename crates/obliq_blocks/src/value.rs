//! Runtime signal values: the scalar/vector/matrix shapes a block reads and
//! produces at simulation time.
//!
//! This mirrors [`obliq_ir::SignalType`]'s three shapes but carries actual
//! numbers rather than a declared type. `bool` signals are represented as
//! `0.0`/`1.0`; the type checker (`obliq_validate`) is responsible for
//! ensuring a block only ever receives the base type it expects.

use obliq_common::{InternalError, XResult};

/// A scalar, vector, or matrix of `f64` samples.
///
/// Matrices are stored row-major, matching the external wire format and the
/// `mux`/`demux` block semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single sample.
    Scalar(f64),
    /// A 1-D array of samples.
    Vector(Vec<f64>),
    /// A 2-D, row-major array of samples.
    Matrix {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// Row-major backing storage, `rows * cols` entries.
        data: Vec<f64>,
    },
}

impl Value {
    /// A boolean reading as a `0.0`/`1.0` scalar.
    pub fn bool(b: bool) -> Self {
        Value::Scalar(if b { 1.0 } else { 0.0 })
    }

    /// `true` if this value reads as boolean-true (nonzero).
    pub fn is_truthy(&self) -> XResult<bool> {
        Ok(self.as_scalar()? != 0.0)
    }

    /// The single scalar sample, or an internal error if this value is not
    /// scalar. A validated model never feeds a non-scalar into a
    /// scalar-only block, so this only fires on a logic bug upstream.
    pub fn as_scalar(&self) -> XResult<f64> {
        match self {
            Value::Scalar(v) => Ok(*v),
            other => Err(InternalError::new(format!(
                "expected a scalar value, found shape {:?}",
                other.shape()
            ))),
        }
    }

    /// Row and column counts; a scalar is `(1, 1)` and a vector is `(len, 1)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Value::Scalar(_) => (1, 1),
            Value::Vector(v) => (v.len(), 1),
            Value::Matrix { rows, cols, .. } => (*rows, *cols),
        }
    }

    /// Total element count, row-major order.
    pub fn element_count(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
            Value::Matrix { data, .. } => data.len(),
        }
    }

    /// A flat, row-major view over every element.
    pub fn elements(&self) -> &[f64] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Vector(v) => v,
            Value::Matrix { data, .. } => data,
        }
    }

    /// Builds a vector value, or a scalar if `data` has exactly one element.
    pub fn vector(data: Vec<f64>) -> Self {
        if data.len() == 1 {
            Value::Scalar(data[0])
        } else {
            Value::Vector(data)
        }
    }

    /// Assembles `rows * cols` row-major scalars, matching the `mux` block:
    /// a vector when either dimension is 1, otherwise a matrix.
    pub fn assemble(rows: usize, cols: usize, data: Vec<f64>) -> XResult<Self> {
        if data.len() != rows * cols {
            return Err(InternalError::new(format!(
                "assemble: expected {} elements for a {}x{} shape, got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(if rows == 1 || cols == 1 {
            Value::vector(data)
        } else {
            Value::Matrix { rows, cols, data }
        })
    }

    /// Applies `f` to every element, preserving shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Vector(v) => Value::Vector(v.iter().map(|x| f(*x)).collect()),
            Value::Matrix { rows, cols, data } => Value::Matrix {
                rows: *rows,
                cols: *cols,
                data: data.iter().map(|x| f(*x)).collect(),
            },
        }
    }

    /// Combines two same-shaped values elementwise. An internal error if the
    /// shapes differ, since a validated model only wires together
    /// same-typed inputs to elementwise blocks.
    pub fn zip_map(&self, other: &Value, f: impl Fn(f64, f64) -> f64) -> XResult<Value> {
        if self.shape() != other.shape() {
            return Err(InternalError::new(format!(
                "zip_map: shape mismatch {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        let data: Vec<f64> = self
            .elements()
            .iter()
            .zip(other.elements().iter())
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(self.reshape_like(data))
    }

    /// Rebuilds a value with this value's shape but `data`'s contents.
    pub fn reshape_like(&self, data: Vec<f64>) -> Value {
        match self {
            Value::Scalar(_) => Value::Scalar(data[0]),
            Value::Vector(_) => Value::Vector(data),
            Value::Matrix { rows, cols, .. } => Value::Matrix { rows: *rows, cols: *cols, data },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_as_scalar() {
        assert_eq!(Value::Scalar(3.0).as_scalar().unwrap(), 3.0);
    }

    #[test]
    fn vector_as_scalar_is_internal_error() {
        assert!(Value::Vector(vec![1.0, 2.0]).as_scalar().is_err());
    }

    #[test]
    fn assemble_picks_vector_when_single_row() {
        let v = Value::assemble(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(v, Value::Vector(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn assemble_picks_matrix_otherwise() {
        let v = Value::assemble(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            v,
            Value::Matrix { rows: 2, cols: 2, data: vec![1.0, 2.0, 3.0, 4.0] }
        );
    }

    #[test]
    fn zip_map_rejects_shape_mismatch() {
        let a = Value::Vector(vec![1.0, 2.0]);
        let b = Value::Vector(vec![1.0, 2.0, 3.0]);
        assert!(a.zip_map(&b, |x, y| x + y).is_err());
    }

    #[test]
    fn map_preserves_shape() {
        let m = Value::Matrix { rows: 1, cols: 2, data: vec![1.0, -2.0] };
        let doubled = m.map(|x| x * 2.0);
        assert_eq!(doubled, Value::Matrix { rows: 1, cols: 2, data: vec![2.0, -4.0] });
    }
}

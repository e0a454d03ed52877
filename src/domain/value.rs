//! Runtime values of the formula evaluator.

/// A formula value: either a constant or a series aligned with the table rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    /// Element at `index`; scalars broadcast to every row.
    pub fn at(&self, index: usize) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::Series(values) => values.get(index).copied().unwrap_or(f64::NAN),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Series(_) => None,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Value::Series(_))
    }

    /// Materialize as a column of `len` rows.
    pub fn into_series(self, len: usize) -> Vec<f64> {
        match self {
            Value::Scalar(v) => vec![v; len],
            Value::Series(values) => values,
        }
    }

    /// Apply `f` element-wise, keeping the scalar/series shape.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(v)),
            Value::Series(values) => Value::Series(values.into_iter().map(f).collect()),
        }
    }

    /// Combine two values element-wise. Two scalars give a scalar; anything
    /// involving a series gives a series of `len` rows.
    pub fn zip_with(&self, other: &Value, len: usize, f: impl Fn(f64, f64) -> f64) -> Value {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(*a, *b)),
            _ => Value::Series((0..len).map(|i| f(self.at(i), other.at(i))).collect()),
        }
    }
}

/// Truthiness used by comparisons and logic: non-zero and not `NaN`.
pub fn truthy(v: f64) -> bool {
    !v.is_nan() && v != 0.0
}

pub fn from_bool(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_broadcasts_against_series() {
        let a = Value::Series(vec![1.0, 2.0, 3.0]);
        let b = Value::Scalar(10.0);
        assert_eq!(
            a.zip_with(&b, 3, |x, y| x + y),
            Value::Series(vec![11.0, 12.0, 13.0])
        );
        assert_eq!(
            b.zip_with(&a, 3, |x, y| x - y),
            Value::Series(vec![9.0, 8.0, 7.0])
        );
    }

    #[test]
    fn two_scalars_stay_scalar() {
        let v = Value::Scalar(2.0).zip_with(&Value::Scalar(3.0), 100, |x, y| x * y);
        assert_eq!(v, Value::Scalar(6.0));
    }

    #[test]
    fn into_series_expands_scalar() {
        assert_eq!(Value::Scalar(1.5).into_series(3), vec![1.5, 1.5, 1.5]);
        assert_eq!(Value::Series(vec![1.0]).into_series(3), vec![1.0]);
    }

    #[test]
    fn truthiness() {
        assert!(truthy(1.0));
        assert!(truthy(-0.5));
        assert!(!truthy(0.0));
        assert!(!truthy(f64::NAN));
        assert_eq!(from_bool(true), 1.0);
        assert_eq!(from_bool(false), 0.0);
    }
}

use serde::{Deserialize, Serialize};
use std::ops::Index;

/// An ordered sequence of signed integers, used for both shapes and strides.
/// `Shape` and `Stride` are aliases rather than distinct types: the data
/// model treats them identically (§3), and keeping one implementation avoids
/// drift between the two.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple(Vec<i64>);

pub type Shape = Tuple;
pub type Stride = Tuple;

impl Tuple {
    pub fn new(values: Vec<i64>) -> Self {
        Tuple(values)
    }

    pub fn scalar() -> Self {
        Tuple(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, i64> {
        self.0.iter()
    }

    /// Number of axes whose extent is greater than one. Used by the
    /// scheduler to decide between the 1D and 2D element-wise kinds.
    pub fn non_unit_axes(&self) -> usize {
        self.0.iter().filter(|&&d| d > 1).count()
    }

    pub fn non_unit_axis_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d > 1)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn product(&self) -> i64 {
        self.0.iter().product()
    }

    pub fn max(&self) -> i64 {
        self.0.iter().copied().max().unwrap_or(0)
    }

    pub fn min(&self) -> i64 {
        self.0.iter().copied().min().unwrap_or(0)
    }

    /// Element-wise max against another tuple of the same rank, used when
    /// computing broadcast shapes.
    pub fn elementwise_max(&self, other: &Tuple) -> Tuple {
        assert_eq!(self.len(), other.len(), "rank mismatch in elementwise_max");
        Tuple(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(&a, &b)| a.max(b))
                .collect(),
        )
    }

    pub fn elementwise_min(&self, other: &Tuple) -> Tuple {
        assert_eq!(self.len(), other.len(), "rank mismatch in elementwise_min");
        Tuple(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(&a, &b)| a.min(b))
                .collect(),
        )
    }

    pub fn without_axis(&self, axis: usize) -> Tuple {
        let mut out = self.0.clone();
        if axis < out.len() {
            out.remove(axis);
        }
        Tuple(out)
    }
}

impl Index<usize> for Tuple {
    type Output = i64;
    fn index(&self, idx: usize) -> &i64 {
        &self.0[idx]
    }
}

impl From<Vec<i64>> for Tuple {
    fn from(v: Vec<i64>) -> Self {
        Tuple(v)
    }
}

impl FromIterator<i64> for Tuple {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Tuple(iter.into_iter().collect())
    }
}

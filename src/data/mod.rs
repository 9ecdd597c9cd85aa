//! Examples and datasets.
//!
//! An [`Example`] is a fixed-length vector of reals; a [`Dataset`] is an ordered,
//! 0-indexed list of examples. Identity is positional: two examples with equal values
//! are still distinct items of the dataset.
//!
//! Datasets are produced by a [`DataSource`]. The crate ships two thin adapters,
//! [`CsvDirectory`] and [`MemorySource`].

mod source;

pub use source::{CsvDirectory, DataSource, MemorySource, SourceError};

use crate::error::{Error, Result};

/// A fixed-length real vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    values: Vec<f64>,
}

impl Example {
    /// Create an example from its coordinates.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the example has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Coordinates in order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Euclidean distance to `other`.
    ///
    /// # Errors
    ///
    /// [`Error::SizeMismatch`] if the two examples have different lengths.
    pub fn distance(&self, other: &Example) -> Result<f64> {
        if self.len() != other.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        Ok(euclidean(&self.values, &other.values))
    }
}

impl From<Vec<f64>> for Example {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

#[inline]
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// An ordered collection of examples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    /// Create a dataset. Lengths are not cross-checked here; a mismatch surfaces
    /// when the offending examples are compared.
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Build a dataset from raw rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self::new(rows.into_iter().map(Example::new).collect())
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the dataset has no examples.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Example at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Example> {
        self.examples.get(index)
    }

    /// Example at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidIndex`] if `index` is out of range.
    pub fn example(&self, index: usize) -> Result<&Example> {
        self.examples.get(index).ok_or(Error::InvalidIndex {
            index: index as i64,
            n_items: self.len(),
        })
    }

    /// Examples at `indices`, in the requested order.
    ///
    /// Indices arrive from the wire as signed integers, so negative values are
    /// rejected the same way as values past the end.
    pub fn select(&self, indices: &[i64]) -> Result<Vec<Example>> {
        indices
            .iter()
            .map(|&i| {
                usize::try_from(i)
                    .ok()
                    .and_then(|u| self.examples.get(u))
                    .cloned()
                    .ok_or(Error::InvalidIndex {
                        index: i,
                        n_items: self.len(),
                    })
            })
            .collect()
    }

    /// Distance between the examples at `a` and `b`.
    pub fn distance(&self, a: usize, b: usize) -> Result<f64> {
        self.example(a)?.distance(self.example(b)?)
    }

    /// Iterate examples in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Example> {
        self.examples.iter()
    }
}

impl FromIterator<Example> for Dataset {
    fn from_iter<T: IntoIterator<Item = Example>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

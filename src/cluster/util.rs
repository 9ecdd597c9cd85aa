use crate::data::Dataset;
use crate::error::Result;

/// Symmetric pairwise distances stored as the strict upper triangle, row-major.
#[derive(Clone, Debug)]
pub(crate) struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Euclidean distances between every pair of examples.
    pub(crate) fn from_dataset(data: &Dataset) -> Result<Self> {
        let n = data.len();
        let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            let ei = data.example(i)?;
            for j in (i + 1)..n {
                values.push(ei.distance(data.example(j)?)?);
            }
        }
        Ok(Self { n, values })
    }

    /// Build from a generator over `i < j`.
    pub(crate) fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                values.push(f(i, j));
            }
        }
        Self { n, values }
    }

    pub(crate) fn len(&self) -> usize {
        self.n
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < self.n);
        // Rows before i hold (n-1) + (n-2) + ... + (n-i) entries.
        i * (2 * self.n - i - 1) / 2 + (j - i - 1)
    }

    /// Distance between `i` and `j` (`i != j`).
    #[inline]
    pub(crate) fn get(&self, i: usize, j: usize) -> f64 {
        if i < j {
            self.values[self.offset(i, j)]
        } else {
            self.values[self.offset(j, i)]
        }
    }

    /// First pair in ascending `(i, j)` order with the strictly smallest distance.
    pub(crate) fn argmin(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        let mut k = 0;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let d = self.values[k];
                k += 1;
                match best {
                    Some((_, _, b)) if d >= b => {}
                    _ => best = Some((i, j, d)),
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_cover_triangle() {
        let m = DistanceMatrix::from_fn(5, |i, j| (i * 10 + j) as f64);
        for i in 0..5 {
            for j in (i + 1)..5 {
                assert_eq!(m.get(i, j), (i * 10 + j) as f64);
                assert_eq!(m.get(j, i), (i * 10 + j) as f64);
            }
        }
    }

    #[test]
    fn test_argmin_first_tie_wins() {
        let m = DistanceMatrix::from_fn(4, |i, j| match (i, j) {
            (0, 3) | (1, 2) => 0.5,
            _ => 2.0,
        });
        assert_eq!(m.argmin(), Some((0, 3, 0.5)));
        assert_eq!(DistanceMatrix::from_fn(1, |_, _| 0.0).argmin(), None);
    }

    #[test]
    fn test_from_dataset() {
        let data = Dataset::from_rows(vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![0.0, 1.0]]);
        let m = DistanceMatrix::from_dataset(&data).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(0, 1), 5.0);
        assert_eq!(m.get(2, 0), 1.0);
    }
}

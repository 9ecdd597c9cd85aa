//! Inter-cluster distance strategies.
//!
//! Every linkage is available in its Lance–Williams recurrence form. Single, average
//! and complete linkage are additionally available as direct scans over the cross
//! product of the two clusters' examples.
//!
//! | Method | Recurrence `d(x ∪ y, i)` |
//! |---|---|
//! | single | `min(dxi, dyi)` |
//! | average | `(nx·dxi + ny·dyi) / (nx + ny)` |
//! | complete | `max(dxi, dyi)` |
//! | centroid | `sqrt((nx·dxi² + ny·dyi² − nx·ny·dxy²/(nx+ny)) / (nx+ny))` |
//! | median | `sqrt(dxi²/2 + dyi²/2 − dxy²/4)` |
//! | ward | `sqrt(((nx+ni)·dxi² + (ny+ni)·dyi² − ni·dxy²) / (nx+ny+ni))` |
//! | weighted average | `(dxi + dyi) / 2` |
//!
//! The geometric methods (centroid, median, ward) are only meaningful on true
//! Euclidean distances, which is what [`Example::distance`](crate::Example::distance)
//! returns.

use std::fmt;

use super::set::Cluster;
use super::traits::{ClusterDistance, LanceWilliams, Merge};
use crate::data::Dataset;
use crate::error::{Error, Result};

/// Minimum pairwise example distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLink;

/// Mean pairwise example distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageLink;

/// Maximum pairwise example distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteLink;

/// Distance between cluster centroids.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidLink;

/// Centroid distance with merged clusters weighted equally (WPGMC).
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianLink;

/// Ward's minimum-variance criterion.
#[derive(Debug, Clone, Copy, Default)]
pub struct WardLink;

/// Average distance with merged clusters weighted equally (WPGMA).
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAverageLink;

/// Fold `f` over every cross pair of example distances.
fn scan_pairs(
    a: &Cluster,
    b: &Cluster,
    data: &Dataset,
    init: f64,
    mut f: impl FnMut(f64, f64) -> f64,
) -> Result<f64> {
    let mut acc = init;
    for i in a.iter() {
        let ei = data.example(i)?;
        for j in b.iter() {
            acc = f(acc, ei.distance(data.example(j)?)?);
        }
    }
    Ok(acc)
}

impl ClusterDistance for SingleLink {
    fn distance(&self, a: &Cluster, b: &Cluster, data: &Dataset) -> Result<f64> {
        scan_pairs(a, b, data, f64::INFINITY, f64::min)
    }
}

impl ClusterDistance for AverageLink {
    fn distance(&self, a: &Cluster, b: &Cluster, data: &Dataset) -> Result<f64> {
        let pairs = a.len() * b.len();
        if pairs == 0 {
            return Ok(f64::INFINITY);
        }
        let sum = scan_pairs(a, b, data, 0.0, |acc, d| acc + d)?;
        Ok(sum / pairs as f64)
    }
}

impl ClusterDistance for CompleteLink {
    fn distance(&self, a: &Cluster, b: &Cluster, data: &Dataset) -> Result<f64> {
        if a.is_empty() || b.is_empty() {
            return Ok(f64::INFINITY);
        }
        scan_pairs(a, b, data, 0.0, f64::max)
    }
}

#[inline]
fn sqrt_clamped(x: f64) -> f64 {
    // Rounding can push a tiny true zero below zero.
    x.max(0.0).sqrt()
}

impl LanceWilliams for SingleLink {
    fn update(&self, m: &Merge) -> f64 {
        m.dxi.min(m.dyi)
    }
}

impl LanceWilliams for AverageLink {
    fn update(&self, m: &Merge) -> f64 {
        let (nx, ny) = (m.nx as f64, m.ny as f64);
        (nx * m.dxi + ny * m.dyi) / (nx + ny)
    }
}

impl LanceWilliams for CompleteLink {
    fn update(&self, m: &Merge) -> f64 {
        m.dxi.max(m.dyi)
    }
}

impl LanceWilliams for CentroidLink {
    fn update(&self, m: &Merge) -> f64 {
        let (nx, ny) = (m.nx as f64, m.ny as f64);
        let nxy = nx + ny;
        sqrt_clamped(
            (nx * m.dxi * m.dxi + ny * m.dyi * m.dyi - nx * ny * m.dxy * m.dxy / nxy) / nxy,
        )
    }
}

impl LanceWilliams for MedianLink {
    fn update(&self, m: &Merge) -> f64 {
        sqrt_clamped(0.5 * (m.dxi * m.dxi + m.dyi * m.dyi) - 0.25 * m.dxy * m.dxy)
    }
}

impl LanceWilliams for WardLink {
    fn update(&self, m: &Merge) -> f64 {
        let (nx, ny, ni) = (m.nx as f64, m.ny as f64, m.ni as f64);
        sqrt_clamped(
            ((nx + ni) * m.dxi * m.dxi + (ny + ni) * m.dyi * m.dyi - ni * m.dxy * m.dxy)
                / (nx + ny + ni),
        )
    }
}

impl LanceWilliams for WeightedAverageLink {
    fn update(&self, m: &Merge) -> f64 {
        0.5 * (m.dxi + m.dyi)
    }
}

/// The supported inter-cluster distance methods, with stable wire ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Minimum pairwise distance.
    Single,
    /// Mean pairwise distance (UPGMA).
    Average,
    /// Maximum pairwise distance.
    Complete,
    /// Centroid distance (UPGMC).
    Centroid,
    /// Median distance (WPGMC).
    Median,
    /// Ward's minimum variance.
    Ward,
    /// Weighted average (WPGMA).
    WeightedAverage,
}

impl Linkage {
    /// Every method, in wire id order.
    pub const ALL: [Linkage; 7] = [
        Linkage::Single,
        Linkage::Average,
        Linkage::Complete,
        Linkage::Centroid,
        Linkage::Median,
        Linkage::Ward,
        Linkage::WeightedAverage,
    ];

    /// Wire id of the method.
    pub fn id(self) -> i32 {
        match self {
            Linkage::Single => 0,
            Linkage::Average => 1,
            Linkage::Complete => 2,
            Linkage::Centroid => 3,
            Linkage::Median => 4,
            Linkage::Ward => 5,
            Linkage::WeightedAverage => 6,
        }
    }

    /// Method for a wire id.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownLinkage`] for ids outside the supported set.
    pub fn from_id(id: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.id() == id)
            .ok_or(Error::UnknownLinkage(id))
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Linkage::Single => "single-link",
            Linkage::Average => "average-link",
            Linkage::Complete => "complete-link",
            Linkage::Centroid => "centroid-link",
            Linkage::Median => "median-link",
            Linkage::Ward => "ward-link",
            Linkage::WeightedAverage => "weighted-average-link",
        }
    }

    /// Direct-scan form, for the methods that have one.
    pub fn direct(self) -> Option<&'static dyn ClusterDistance> {
        match self {
            Linkage::Single => Some(&SingleLink),
            Linkage::Average => Some(&AverageLink),
            Linkage::Complete => Some(&CompleteLink),
            _ => None,
        }
    }

    /// Lance–Williams recurrence form.
    pub fn recurrence(self) -> &'static dyn LanceWilliams {
        match self {
            Linkage::Single => &SingleLink,
            Linkage::Average => &AverageLink,
            Linkage::Complete => &CompleteLink,
            Linkage::Centroid => &CentroidLink,
            Linkage::Median => &MedianLink,
            Linkage::Ward => &WardLink,
            Linkage::WeightedAverage => &WeightedAverageLink,
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Dataset {
        Dataset::from_rows(vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0], vec![0.0, 1.0]])
    }

    fn cluster(ix: &[usize]) -> Cluster {
        ix.iter().copied().collect()
    }

    #[test]
    fn test_direct_strategies() {
        let data = data();
        let a = cluster(&[0, 3]);
        let b = cluster(&[1, 2]);
        // d(0,1)=5, d(0,2)=10, d(3,1)=sqrt(18), d(3,2)=sqrt(85)
        let single = SingleLink.distance(&a, &b, &data).unwrap();
        let complete = CompleteLink.distance(&a, &b, &data).unwrap();
        let average = AverageLink.distance(&a, &b, &data).unwrap();
        assert!((single - 18f64.sqrt()).abs() < 1e-12);
        assert!((complete - 10.0).abs() < 1e-12);
        let expected = (5.0 + 10.0 + 18f64.sqrt() + 85f64.sqrt()) / 4.0;
        assert!((average - expected).abs() < 1e-12);
    }

    #[test]
    fn test_direct_strategies_symmetric() {
        let data = data();
        let a = cluster(&[0]);
        let b = cluster(&[1, 2, 3]);
        for l in [Linkage::Single, Linkage::Average, Linkage::Complete] {
            let s = l.direct().unwrap();
            assert_eq!(
                s.distance(&a, &b, &data).unwrap(),
                s.distance(&b, &a, &data).unwrap(),
                "{l}"
            );
        }
    }

    #[test]
    fn test_direct_propagates_size_mismatch() {
        let data = Dataset::from_rows(vec![vec![0.0], vec![1.0, 2.0]]);
        let err = SingleLink
            .distance(&Cluster::singleton(0), &Cluster::singleton(1), &data)
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn test_recurrence_formulas() {
        let m = Merge {
            dxi: 3.0,
            dyi: 4.0,
            dxy: 2.0,
            nx: 1,
            ny: 3,
            ni: 2,
        };
        assert_eq!(SingleLink.update(&m), 3.0);
        assert_eq!(CompleteLink.update(&m), 4.0);
        assert_eq!(AverageLink.update(&m), 15.0 / 4.0);
        assert_eq!(WeightedAverageLink.update(&m), 3.5);
        assert!((MedianLink.update(&m) - (12.5f64 - 1.0).sqrt()).abs() < 1e-12);
        // (1*9 + 3*16 - 3*4/4) / 4 = 54/4
        assert!((CentroidLink.update(&m) - 13.5f64.sqrt()).abs() < 1e-12);
        // (3*9 + 5*16 - 2*4) / 6 = 99/6
        assert!((WardLink.update(&m) - 16.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_recurrence_symmetric_in_merged_pair() {
        let m = Merge {
            dxi: 1.5,
            dyi: 2.5,
            dxy: 1.0,
            nx: 2,
            ny: 2,
            ni: 1,
        };
        let swapped = Merge {
            dxi: m.dyi,
            dyi: m.dxi,
            ..m
        };
        for l in Linkage::ALL {
            let r = l.recurrence();
            assert!((r.update(&m) - r.update(&swapped)).abs() < 1e-12, "{l}");
        }
    }

    #[test]
    fn test_recurrence_clamps_negative_radicand() {
        let m = Merge {
            dxi: 0.0,
            dyi: 0.0,
            dxy: 1.0,
            nx: 1,
            ny: 1,
            ni: 1,
        };
        assert_eq!(MedianLink.update(&m), 0.0);
    }

    #[test]
    fn test_ids_round_trip() {
        for l in Linkage::ALL {
            assert_eq!(Linkage::from_id(l.id()).unwrap(), l);
        }
        assert!(matches!(Linkage::from_id(7), Err(Error::UnknownLinkage(7))));
        assert!(matches!(Linkage::from_id(-1), Err(Error::UnknownLinkage(-1))));
    }
}

use dendro::cluster::{mine, mine_recurrence, Agglomerative, CompleteLink, Linkage, SingleLink};
use dendro::codec::{from_bytes, to_bytes};
use dendro::{Cluster, Dataset, Dendrogram};
use proptest::prelude::*;

fn dataset(dim: usize, max_rows: usize) -> impl Strategy<Value = Dataset> {
    prop::collection::vec(prop::collection::vec(-10.0f64..10.0, dim), 1..max_rows)
        .prop_map(Dataset::from_rows)
}

fn linkage() -> impl Strategy<Value = Linkage> {
    prop::sample::select(Linkage::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_levels_partition_and_shrink(data in dataset(2, 12), link in linkage()) {
        let n = data.len();
        let d = Agglomerative::new(link).mine(&data, n).unwrap();

        prop_assert_eq!(d.depth(), n);
        for (i, level) in d.iter().enumerate() {
            prop_assert_eq!(level.len(), n - i);
            prop_assert!(level.is_partition_of(n));
        }
        let all: Cluster = (0..n).collect();
        prop_assert_eq!(&**d.last().unwrap().get(0).unwrap(), &all);
    }

    #[test]
    fn prop_each_level_is_one_merge(data in dataset(3, 10), link in linkage()) {
        let n = data.len();
        let d = Agglomerative::new(link).mine(&data, n).unwrap();
        for pair in d.levels().windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            // Every cluster of the next level but one is carried over unchanged.
            let carried = next
                .iter()
                .filter(|c| prev.iter().any(|p| std::sync::Arc::ptr_eq(p, c)))
                .count();
            prop_assert_eq!(carried, next.len() - 1);
        }
    }

    #[test]
    fn prop_direct_strategies_symmetric(
        data in dataset(2, 10),
        split in 1usize..9,
    ) {
        let n = data.len();
        prop_assume!(n >= 2);
        let split = split.min(n - 1);
        let a: Cluster = (0..split).collect();
        let b: Cluster = (split..n).collect();
        for link in [Linkage::Single, Linkage::Average, Linkage::Complete] {
            let s = link.direct().unwrap();
            let ab = s.distance(&a, &b, &data).unwrap();
            let ba = s.distance(&b, &a, &data).unwrap();
            prop_assert!((ab - ba).abs() <= 1e-9 * ab.abs().max(1.0));
        }
    }

    #[test]
    fn prop_round_trip(data in dataset(2, 12), link in linkage(), depth in 1usize..12) {
        let depth = depth.min(data.len());
        let d = Agglomerative::new(link).mine(&data, depth).unwrap();
        let back: Dendrogram = from_bytes(&to_bytes(&d).unwrap()).unwrap();
        prop_assert_eq!(back, d);
    }

    #[test]
    fn prop_mining_deterministic(data in dataset(2, 10), link in linkage()) {
        let n = data.len();
        let a = to_bytes(&Agglomerative::new(link).mine(&data, n).unwrap()).unwrap();
        let b = to_bytes(&Agglomerative::new(link).mine(&data, n).unwrap()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_recurrence_agrees_with_direct(data in dataset(2, 10)) {
        let n = data.len();
        prop_assert_eq!(
            mine(&data, &SingleLink, n).unwrap(),
            mine_recurrence(&data, &SingleLink, n).unwrap()
        );
        prop_assert_eq!(
            mine(&data, &CompleteLink, n).unwrap(),
            mine_recurrence(&data, &CompleteLink, n).unwrap()
        );
    }

    #[test]
    fn prop_depth_out_of_range_rejected(data in dataset(2, 8), extra in 1usize..4) {
        let n = data.len();
        prop_assert!(mine(&data, &SingleLink, 0).is_err());
        prop_assert!(mine(&data, &SingleLink, n + extra).is_err());
    }
}

use std::collections::BTreeMap;

use bytes::Bytes;
use proptest::prelude::*;

use kevadb::{
    flush, MemNameStore, NameCache, NameEntry, NameIterator, NameKey, NameRead, NameRecord,
    OutPoint, WriteOptions,
};

#[derive(Debug, Clone)]
enum MiniOp {
    Set { name: u8, value: u8 },
    Remove { name: u8 },
}

const NAMESPACES: [&[u8]; 4] = [b"", b"a", b"ab", b"a\x00"];
const KEYS: [&[u8]; 4] = [b"", b"x", b"xy", b"\x00"];
const NAME_SPACE: u8 = 16;

fn name(idx: u8) -> NameKey {
    let idx = idx % NAME_SPACE;
    NameKey::new(
        Bytes::from_static(NAMESPACES[(idx / 4) as usize]),
        Bytes::from_static(KEYS[(idx % 4) as usize]),
    )
}

fn record(value: u8) -> NameRecord {
    NameRecord::new(vec![value], value as u32, OutPoint::new([value; 32], 0), vec![b'o'])
}

fn apply_op(cache: &mut NameCache, op: &MiniOp) {
    match op {
        MiniOp::Set { name: n, value } => cache.set(name(*n), record(*value)),
        MiniOp::Remove { name: n } => cache.remove(name(*n)),
    }
}

fn ref_apply(model: &mut BTreeMap<NameKey, NameRecord>, op: &MiniOp) {
    match op {
        MiniOp::Set { name: n, value } => {
            model.insert(name(*n), record(*value));
        }
        MiniOp::Remove { name: n } => {
            model.remove(&name(*n));
        }
    }
}

fn seeded_store(seed: &[(u8, u8)]) -> MemNameStore {
    let store = MemNameStore::in_memory();
    let mut cache = NameCache::new();
    for (n, v) in seed {
        cache.set(name(*n), record(*v));
    }
    flush(&mut cache, &store, WriteOptions::default()).unwrap();
    store
}

fn collect<I: NameIterator + ?Sized>(iter: &mut I) -> Vec<NameEntry> {
    iter.map(|next| next.unwrap()).collect()
}

fn op_strategy() -> impl Strategy<Value = MiniOp> {
    prop_oneof![
        (0u8..NAME_SPACE, any::<u8>()).prop_map(|(name, value)| MiniOp::Set { name, value }),
        (0u8..NAME_SPACE).prop_map(|name| MiniOp::Remove { name }),
    ]
}

fn seed_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..NAME_SPACE, any::<u8>()), 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn entries_and_deleted_stay_disjoint(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut cache = NameCache::new();
        for op in &ops {
            apply_op(&mut cache, op);
            for n in 0..NAME_SPACE {
                let key = name(n);
                prop_assert!(!(cache.get(&key).is_some() && cache.is_deleted(&key)));
            }
        }
    }

    #[test]
    fn merged_scan_matches_reference(
        seed in seed_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..40),
        start in 0u8..NAME_SPACE,
    ) {
        let store = seeded_store(&seed);
        let mut model: BTreeMap<NameKey, NameRecord> = BTreeMap::new();
        for (n, v) in &seed {
            model.insert(name(*n), record(*v));
        }

        let mut cache = NameCache::new();
        for op in &ops {
            apply_op(&mut cache, op);
            ref_apply(&mut model, op);
        }

        let expected: Vec<NameEntry> = model.clone().into_iter().collect();
        let mut merged = cache.iterate_names(store.iter_names().unwrap());
        prop_assert_eq!(collect(&mut merged), expected);

        let from = name(start);
        let expected_from: Vec<NameEntry> = model.range(from.clone()..)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.seek(&from);
        prop_assert_eq!(collect(&mut merged), expected_from);
    }

    #[test]
    fn apply_then_flush_matches_direct_application(
        seed in seed_strategy(),
        parent_ops in prop::collection::vec(op_strategy(), 0..20),
        child_ops in prop::collection::vec(op_strategy(), 0..20),
    ) {
        // Staged: child cache applied onto parent, then flushed.
        let staged = seeded_store(&seed);
        let mut parent = NameCache::new();
        for op in &parent_ops {
            apply_op(&mut parent, op);
        }
        let mut child = NameCache::new();
        for op in &child_ops {
            apply_op(&mut child, op);
        }
        parent.apply(&child);
        flush(&mut parent, &staged, WriteOptions::default()).unwrap();

        // Direct: every operation against one cache, then flushed.
        let direct = seeded_store(&seed);
        let mut cache = NameCache::new();
        for op in parent_ops.iter().chain(child_ops.iter()) {
            apply_op(&mut cache, op);
        }
        flush(&mut cache, &direct, WriteOptions::default()).unwrap();

        prop_assert_eq!(
            collect(&mut *staged.iter_names().unwrap()),
            collect(&mut *direct.iter_names().unwrap())
        );
        for n in 0..NAME_SPACE {
            prop_assert_eq!(staged.get_name(&name(n)).unwrap(), direct.get_name(&name(n)).unwrap());
        }
    }

    #[test]
    fn encoding_order_matches_name_order(a in 0u8..NAME_SPACE, b in 0u8..NAME_SPACE) {
        let (na, nb) = (name(a), name(b));
        prop_assert_eq!(na.cmp(&nb), na.encode_to_vec().unwrap().cmp(&nb.encode_to_vec().unwrap()));
    }
}

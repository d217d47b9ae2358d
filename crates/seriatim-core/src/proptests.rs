//! Property-based tests of the symbol-set operations.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::collection::vec as pvec;
    use proptest::prelude::*;

    use crate::symbols::SymbolSet;

    // Short names over a five-letter alphabet so generated sets overlap
    // often.
    fn names() -> impl Strategy<Value = Vec<String>> {
        pvec("[a-e]{1,2}", 0..8)
    }

    proptest! {
        #[test]
        fn from_names_sorts_and_dedups(names in names()) {
            let set = SymbolSet::from_names(names.iter().cloned());
            for i in 1..set.len() {
                prop_assert!(set.get(i - 1).unwrap() < set.get(i).unwrap());
            }
            let unique: BTreeSet<&String> = names.iter().collect();
            prop_assert_eq!(set.len(), unique.len());
        }

        #[test]
        fn merge_is_the_sorted_union(a in names(), b in names()) {
            let left = SymbolSet::from_names(a.iter().cloned());
            let right = SymbolSet::from_names(b.iter().cloned());
            let merged = left.merge(&right);
            let union: Vec<String> = a
                .iter()
                .chain(&b)
                .cloned()
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect();
            prop_assert_eq!(merged.iter().map(str::to_owned).collect::<Vec<_>>(), union);
            prop_assert_eq!(&right.merge(&left), &merged);
            prop_assert_eq!(&merged.merge(&left), &merged);
        }

        #[test]
        fn index_of_inverts_get(names in names()) {
            let set = SymbolSet::from_names(names);
            for i in 0..set.len() {
                prop_assert_eq!(set.index_of(set.get(i).unwrap()), Some(i));
            }
        }

        #[test]
        fn extension_map_lands_each_symbol(a in names(), b in names()) {
            let base = SymbolSet::from_names(a);
            let merged = base.merge(&SymbolSet::from_names(b));
            let map = base.extension_map(&merged).unwrap();
            prop_assert_eq!(map.len(), base.len());
            for (i, &j) in map.iter().enumerate() {
                prop_assert_eq!(merged.get(j), base.get(i));
            }
            // The map preserves symbol order inside the superset.
            for w in map.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
        }

        #[test]
        fn positions_resolve_to_member_names(pool in names(), wanted in names()) {
            let set = SymbolSet::from_names(pool);
            let positions = set.positions(&wanted);
            for w in positions.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            for &p in &positions {
                let name = set.get(p).unwrap();
                prop_assert!(wanted.iter().any(|n| n == name));
            }
            let expected = wanted
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter(|n| set.contains(n.as_str()))
                .count();
            prop_assert_eq!(positions.len(), expected);
        }
    }
}

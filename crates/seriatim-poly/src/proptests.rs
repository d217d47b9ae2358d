//! Property-based tests of the packing codec and the multiplication
//! engine.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::collection::vec as pvec;
    use proptest::prelude::*;

    use seriatim_core::SymbolSet;

    use crate::kronecker;
    use crate::monomial::KeyKind;
    use crate::series::Series;

    const SYMBOLS: [&str; 4] = ["t", "x", "y", "z"];

    // One term list describes the same series in both representations.
    type RawTerms = Vec<(Vec<i64>, i64)>;

    fn raw_terms(dim: usize) -> impl Strategy<Value = RawTerms> {
        pvec((pvec(-5i64..=5, dim), -20i64..=20), 0..8)
    }

    fn build(kind: KeyKind, dim: usize, terms: &RawTerms) -> Series<i64> {
        let mut series = Series::new(
            kind,
            SymbolSet::from_names(SYMBOLS[..dim].iter().copied()),
        )
        .unwrap();
        for (exponents, coefficient) in terms {
            series.insert(exponents, *coefficient).unwrap();
        }
        series
    }

    fn exponent_map(series: &Series<i64>, dim: usize) -> BTreeMap<Vec<i64>, i64> {
        series
            .iter()
            .map(|t| (t.key.exponents(dim).unwrap().to_vec(), t.coefficient))
            .collect()
    }

    fn dim_exponents() -> impl Strategy<Value = Vec<i64>> {
        (1usize..=4).prop_flat_map(|dim| pvec(-1000i64..=1000, dim))
    }

    proptest! {
        #[test]
        fn codec_round_trips(exponents in dim_exponents()) {
            let code = kronecker::encode(&exponents).unwrap();
            let decoded = kronecker::decode(code, exponents.len()).unwrap();
            prop_assert_eq!(decoded, exponents);
        }

        #[test]
        fn codec_is_additive(
            pair in (1usize..=4).prop_flat_map(|dim| {
                (pvec(-1000i64..=1000, dim), pvec(-1000i64..=1000, dim))
            })
        ) {
            // Spans of +/-1000 keep the sums far inside every packing
            // bound up to four dimensions.
            let (a, b) = pair;
            let sum: Vec<i64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
            prop_assert_eq!(
                kronecker::encode(&a).unwrap() + kronecker::encode(&b).unwrap(),
                kronecker::encode(&sum).unwrap()
            );
        }

        #[test]
        fn multiplication_commutes(a in raw_terms(2), b in raw_terms(2)) {
            let left = build(KeyKind::Packed, 2, &a);
            let right = build(KeyKind::Packed, 2, &b);
            prop_assert_eq!(
                left.multiply_untruncated(&right).unwrap(),
                right.multiply_untruncated(&left).unwrap()
            );
        }

        #[test]
        fn packed_and_vector_products_agree(a in raw_terms(2), b in raw_terms(2)) {
            let packed = build(KeyKind::Packed, 2, &a)
                .multiply_untruncated(&build(KeyKind::Packed, 2, &b))
                .unwrap();
            let vector = build(KeyKind::Vector, 2, &a)
                .multiply_untruncated(&build(KeyKind::Vector, 2, &b))
                .unwrap();
            prop_assert_eq!(exponent_map(&packed, 2), exponent_map(&vector, 2));
        }

        #[test]
        fn truncation_filters_the_full_product(
            a in raw_terms(2),
            b in raw_terms(2),
            limit in -2i64..=12,
        ) {
            let left = build(KeyKind::Packed, 2, &a);
            let right = build(KeyKind::Packed, 2, &b);
            let full = left.multiply_untruncated(&right).unwrap();
            let cut = left.multiply_truncated(&right, limit).unwrap();
            let mut expected = Series::new(KeyKind::Packed, full.symbols().clone()).unwrap();
            for term in full.iter() {
                if term.key.degree(2).unwrap() <= limit {
                    expected.insert_term(term.clone()).unwrap();
                }
            }
            prop_assert_eq!(cut, expected);
        }

        #[test]
        fn products_of_monomials_multiply_coefficients(
            e1 in pvec(-100i64..=100, 3),
            c1 in -1000i64..=1000,
            e2 in pvec(-100i64..=100, 3),
            c2 in -1000i64..=1000,
        ) {
            prop_assume!(c1 != 0 && c2 != 0);
            let a = build(KeyKind::Packed, 3, &vec![(e1.clone(), c1)]);
            let b = build(KeyKind::Packed, 3, &vec![(e2.clone(), c2)]);
            let p = a.multiply_untruncated(&b).unwrap();
            let sum: Vec<i64> = e1.iter().zip(&e2).map(|(x, y)| x + y).collect();
            prop_assert_eq!(p.len(), 1);
            prop_assert_eq!(p.get(&sum).unwrap(), Some(&(c1 * c2)));
        }
    }
}

//! Property-based tests cross-checking `Int` against `dashu`.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::Int;
    use dashu::integer::IBig;
    use seriatim_core::Coefficient;

    // Strategy for generating machine-word values
    fn machine_int() -> impl Strategy<Value = i128> {
        any::<i128>()
    }

    // Strategy for generating raw limbs, biased towards carries
    fn limbs() -> impl Strategy<Value = Vec<u64>> {
        prop::collection::vec(
            prop_oneof![
                Just(0u64),
                Just(1u64),
                Just(u64::MAX),
                Just(u64::MAX - 1),
                any::<u64>(),
            ],
            0..4,
        )
    }

    fn sign() -> impl Strategy<Value = i8> {
        prop_oneof![Just(-1i8), Just(1i8)]
    }

    // Builds the same value as an `Int` and as a reference `IBig`.
    fn from_limbs(sign: i8, limbs: &[u64]) -> (Int, IBig) {
        let base_int = Int::from(u64::MAX) + Int::from(1u8);
        let base_ref = IBig::from(u64::MAX) + IBig::from(1u8);
        let mut value = Int::default();
        let mut reference = IBig::from(0u8);
        for &limb in limbs.iter().rev() {
            value = value * &base_int + Int::from(limb);
            reference = reference * &base_ref + IBig::from(limb);
        }
        if sign < 0 {
            value = -value;
            reference = -reference;
        }
        (value, reference)
    }

    proptest! {
        #[test]
        fn add_matches_reference(sa in sign(), la in limbs(), sb in sign(), lb in limbs()) {
            let (a, ra) = from_limbs(sa, &la);
            let (b, rb) = from_limbs(sb, &lb);
            prop_assert_eq!((&a + &b).to_string(), (ra + rb).to_string());
        }

        #[test]
        fn sub_matches_reference(sa in sign(), la in limbs(), sb in sign(), lb in limbs()) {
            let (a, ra) = from_limbs(sa, &la);
            let (b, rb) = from_limbs(sb, &lb);
            prop_assert_eq!((&a - &b).to_string(), (ra - rb).to_string());
        }

        #[test]
        fn mul_matches_reference(sa in sign(), la in limbs(), sb in sign(), lb in limbs()) {
            let (a, ra) = from_limbs(sa, &la);
            let (b, rb) = from_limbs(sb, &lb);
            prop_assert_eq!((&a * &b).to_string(), (ra * rb).to_string());
        }

        #[test]
        fn fma_matches_reference(
            sc in sign(), lc in limbs(),
            sa in sign(), la in limbs(),
            sb in sign(), lb in limbs()
        ) {
            let (mut acc, racc) = from_limbs(sc, &lc);
            let (a, ra) = from_limbs(sa, &la);
            let (b, rb) = from_limbs(sb, &lb);
            acc.multiply_accumulate(&a, &b);
            prop_assert_eq!(acc.to_string(), (racc + ra * rb).to_string());
        }

        #[test]
        fn ordering_matches_reference(sa in sign(), la in limbs(), sb in sign(), lb in limbs()) {
            let (a, ra) = from_limbs(sa, &la);
            let (b, rb) = from_limbs(sb, &lb);
            prop_assert_eq!(a.cmp(&b), ra.cmp(&rb));
        }

        #[test]
        fn display_parse_round_trip(s in sign(), l in limbs()) {
            let (a, _) = from_limbs(s, &l);
            let parsed: Int = a.to_string().parse().unwrap();
            prop_assert_eq!(parsed, a);
        }

        #[test]
        fn to_i64_window(v in machine_int()) {
            let a = Int::from(v);
            prop_assert_eq!(a.to_i64(), i64::try_from(v).ok());
        }

        #[test]
        fn add_commutative(sa in sign(), la in limbs(), sb in sign(), lb in limbs()) {
            let (a, _) = from_limbs(sa, &la);
            let (b, _) = from_limbs(sb, &lb);
            prop_assert_eq!(&a + &b, &b + &a);
        }

        #[test]
        fn mul_distributive(
            sa in sign(), la in limbs(),
            sb in sign(), lb in limbs(),
            sc in sign(), lc in limbs()
        ) {
            let (a, _) = from_limbs(sa, &la);
            let (b, _) = from_limbs(sb, &lb);
            let (c, _) = from_limbs(sc, &lc);
            prop_assert_eq!(&a * &(&b + &c), &(&a * &b) + &(&a * &c));
        }

        #[test]
        fn additive_inverse(s in sign(), l in limbs()) {
            let (a, _) = from_limbs(s, &l);
            prop_assert_eq!(&a + &(-&a), Int::default());
        }
    }
}

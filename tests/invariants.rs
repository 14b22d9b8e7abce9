//! Property-based invariants over the counting engine, quantified rather
//! than enumerated: max-k monotonicity, ratio consistency, and
//! memoisation idempotence.

use hnk::ArchetypeNode;
use proptest::prelude::*;

proptest! {
    #[test]
    fn max_k_at_h_is_monotonic_in_height(n in 1u8..=9, max_h in 1u32..6) {
        let archetype = ArchetypeNode::new_nary(n, max_h, 2000).unwrap();
        archetype.set_self_recursive().unwrap();

        let mut prev = archetype.max_k_at_h(0).unwrap();
        for h in 1..=max_h {
            let cur = archetype.max_k_at_h(h).unwrap();
            prop_assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn ratio_times_count_reconstructs_next_count(n in 2u8..=6, h in 1u32..4, k in 0u32..6) {
        let archetype = ArchetypeNode::new_nary(n, 4, 2000).unwrap();
        archetype.set_self_recursive().unwrap();

        let storage = archetype.max_k_at_h_storage(h).unwrap();
        prop_assume!(k < storage);

        let count_k = archetype.count(h, k as i64).unwrap().to_f64_approx();
        let count_kplus1 = archetype.count(h, k as i64 + 1).unwrap().to_f64_approx();
        let ratio = archetype.ratio_kplus1(h, k).unwrap();

        if count_k == 0.0 {
            prop_assert_eq!(ratio, 0.0);
        } else {
            let reconstructed = ratio * count_k;
            let relative_error = (reconstructed - count_kplus1).abs() / count_kplus1.max(1.0);
            prop_assert!(relative_error < 1e-6);
        }
    }

    #[test]
    fn count_is_idempotent_once_memoised(n in 1u8..=9, h in 1u32..4, k in 0u32..10) {
        let archetype = ArchetypeNode::new_nary(n, 4, 2000).unwrap();
        archetype.set_self_recursive().unwrap();

        let first = archetype.count(h, k as i64).unwrap();
        if k > 0 {
            prop_assert!(archetype.is_count_memoised(h, k));
        }
        let second = archetype.count(h, k as i64).unwrap();
        prop_assert_eq!(first, second);
    }
}

//! Literal test vectors for canonical archetype shapes: binary, quaternary,
//! ternary-via-aggregate, and the 3/4 Cartesian cross-archetype tree.

use hnk::{Archetype, ArchetypeNode, Count};

fn counts_for(archetype: &Archetype, h: u32, upto_k: i64) -> Vec<u64> {
    (0..=upto_k)
        .map(|k| {
            archetype
                .count(h, k)
                .unwrap()
                .to_f64_approx()
                .round() as u64
        })
        .collect()
}

#[test]
fn binary_matches_catalan_like_sequence_at_height_three() {
    let binary = ArchetypeNode::new_nary(2, 3, 20).unwrap();
    binary.set_self_recursive().unwrap();

    let expected: Vec<u64> = vec![1, 1, 2, 5, 14, 26, 44, 69, 94, 114, 116, 94, 60, 28, 8, 1, 0];
    let got = counts_for(&binary, 3, (expected.len() - 1) as i64);
    assert_eq!(got, expected);
}

#[test]
fn quaternary_matches_sequence_at_height_three() {
    let quaternary = ArchetypeNode::new_nary(4, 3, 100).unwrap();
    quaternary.set_self_recursive().unwrap();

    let expected: Vec<u64> = vec![
        1, 1, 4, 22, 76, 233, 620, 1420, 2876, 5156, 8112, 11182, 13420, 13750, 11704, 8056, 4372,
        1820, 560, 120, 16, 1, 0,
    ];
    let got = counts_for(&quaternary, 3, (expected.len() - 1) as i64);
    assert_eq!(got, expected);
}

#[test]
fn ternary_via_self_referential_aggregate_matches_prefix_at_height_three() {
    let ternary = ArchetypeNode::new_aggregate_empty(3, 3, 200).unwrap();
    for i in 0..3 {
        ternary.set_aggregate_subtree(i, std::rc::Rc::clone(&ternary)).unwrap();
    }

    let expected: Vec<u64> = vec![1, 1, 3, 12, 55, 192, 618];
    let got = counts_for(&ternary, 3, (expected.len() - 1) as i64);
    assert_eq!(got, expected);
}

#[test]
fn three_four_cartesian_matches_prefix_at_height_three() {
    let quaternary_child = ArchetypeNode::new_nary(4, 3, 100).unwrap();
    quaternary_child.set_self_recursive().unwrap();

    let root = ArchetypeNode::new_nary(3, 3, 500).unwrap();
    root.set_subtree(quaternary_child).unwrap();

    let expected: Vec<u64> = vec![1, 1, 3, 15, 91, 420];
    let got = counts_for(&root, 3, (expected.len() - 1) as i64);
    assert_eq!(got, expected);
}

#[test]
fn seven_eight_cartesian_matches_prefix_at_height_three() {
    let octary_child = ArchetypeNode::new_nary(8, 3, 5_000_000).unwrap();
    octary_child.set_self_recursive().unwrap();

    let root = ArchetypeNode::new_nary(7, 3, 2_000_000_000).unwrap();
    root.set_subtree(octary_child).unwrap();

    let expected: Vec<u64> = vec![
        1, 1, 7, 77, 1015, 11179, 115563, 1155707, 11191895, 105454216, 969258381,
    ];
    let got = counts_for(&root, 3, (expected.len() - 1) as i64);
    assert_eq!(got, expected);
}

#[test]
fn three_four_cartesian_ratio_scenario() {
    let quaternary_child = ArchetypeNode::new_nary(4, 3, 100).unwrap();
    quaternary_child.set_self_recursive().unwrap();

    let root = ArchetypeNode::new_nary(3, 3, 500).unwrap();
    root.set_subtree(quaternary_child).unwrap();

    let expected = [1.0, 3.0, 5.0, 91.0 / 15.0, 420.0 / 91.0];
    for (k, &want) in expected.iter().enumerate() {
        let got = root.ratio_kplus1(3, k as u32).unwrap();
        assert!((got - want).abs() < 1e-9, "k={k} got={got} want={want}");
    }
}

#[test]
fn zero_and_one_are_universal_across_archetypes() {
    let archetypes: Vec<Archetype> = vec![
        {
            let a = ArchetypeNode::new_nary(2, 2, 10).unwrap();
            a.set_self_recursive().unwrap();
            a
        },
        {
            let a = ArchetypeNode::new_nary(5, 2, 10).unwrap();
            a.set_self_recursive().unwrap();
            a
        },
    ];
    for archetype in &archetypes {
        for h in 0..=archetype.max_h() {
            assert_eq!(archetype.count(h, 0).unwrap(), Count::one());
        }
    }
}

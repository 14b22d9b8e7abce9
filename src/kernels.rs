//! The convolution algorithms that populate a node's memo tables: pure
//! n-ary splits over identical children, and balanced aggregate splits
//! over a heterogeneous child list.

use crate::archetype::{Archetype, ArchetypeNode};
use crate::error::HnkError;
use hnk_bignum::Count;

/// Dispatch for `Policy::Nary(n)`. `n == 1` is direct recursion into the
/// child at `h - 1, k - 1`; `n >= 2` goes through the general split kernel.
pub(crate) fn nary_count(node: &ArchetypeNode, n: u8, h: u32, k: u32) -> Result<Count, HnkError> {
    let child = node.effective_child();
    if n == 1 {
        return if k <= 1 {
            Ok(if k == 1 { Count::one() } else { Count::zero() })
        } else {
            child.count((h - 1).min(child.max_h()), k as i64 - 1)
        };
    }
    n_ary_combine(node, &child, h, k, n as u32)
}

/// Partitions `k - 1` remaining elements (one reserved for the root) across
/// `n` identical subtrees of maximum child height `h - 1`.
pub(crate) fn n_ary_combine(node: &ArchetypeNode, child: &Archetype, h: u32, k: u32, n: u32) -> Result<Count, HnkError> {
    if k <= 1 {
        return Ok(Count::one());
    }
    let child_h = (h - 1).min(child.max_h());
    let max_child_k = child.max_k_at_h(child_h)? as i64;
    let capacity = max_child_k * n as i64 + 1;
    let k_i = k as i64;
    if capacity < k_i {
        return Ok(Count::zero());
    }
    if capacity == k_i {
        return Ok(Count::one());
    }
    split(node, child, h, k_i - 1, n)
}

/// Recursive halving convolution: the number of ways to distribute `size`
/// elements across `width` identical subtrees. Widths are memoised on
/// `node.split_counts` directly by width, not by the log2 bin implied by
/// the original's split-bin indexing (see DESIGN.md) — the values are
/// identical, only the memo key's shape differs.
fn split(node: &ArchetypeNode, child: &Archetype, h: u32, size: i64, width: u32) -> Result<Count, HnkError> {
    if size < 0 {
        return Ok(Count::zero());
    }
    if size == 0 {
        return Ok(Count::one());
    }
    let child_h = (h - 1).min(child.max_h());
    if width == 1 {
        return child.count(child_h, size);
    }

    let bin = width as usize;
    if let Some(c) = node.memo_split(h, size as u32, bin) {
        return Ok(c);
    }

    let max_child_k = child.max_k_at_h(child_h)? as i64;
    let value = if width == 2 {
        let lo = (size - max_child_k).max(0);
        let hi = size.min(max_child_k);
        let mut acc = Count::zero();
        let mut j = lo;
        while j <= hi {
            let a = child.count(child_h, j)?;
            let b = child.count(child_h, size - j)?;
            acc += &a * &b;
            j += 1;
        }
        acc
    } else if width % 2 == 0 {
        let m = width / 2;
        let lo = (size - 1 - m as i64 * max_child_k).max(0);
        let hi = (size - 1).min(m as i64 * max_child_k);
        let mut acc = Count::zero();
        let mut j = lo;
        while j <= hi {
            let a = split(node, child, h, j + 1, m)?;
            let b = split(node, child, h, size - j, m)?;
            acc += &a * &b;
            j += 1;
        }
        acc
    } else {
        let m2 = width - 1;
        let lo = (size - 1 - m2 as i64 * max_child_k).max(0);
        let hi = (size - 1).min(max_child_k);
        let mut acc = Count::zero();
        let mut j = lo;
        while j <= hi {
            let a = child.count(child_h, j)?;
            let b = split(node, child, h, size - j, m2)?;
            acc += &a * &b;
            j += 1;
        }
        acc
    };

    node.store_split(h, size as u32, bin, value.clone());
    Ok(value)
}

/// Dispatch for `Policy::Aggregate`.
pub(crate) fn aggregate_count(node: &ArchetypeNode, h: u32, k: u32) -> Result<Count, HnkError> {
    if k <= 1 {
        return Ok(Count::one());
    }
    let children = node.children_snapshot();
    let max_total = node.max_k_at_h(h)?;
    if k > max_total {
        return Ok(Count::zero());
    }
    if k == max_total {
        return Ok(Count::one());
    }
    if h == 0 && k > node.n_splits() {
        return Ok(Count::zero());
    }
    aggregate_split(node, &children, 1, h, k as i64, children.len() as u32)
}

fn children_max_k(children: &[Archetype], h: u32) -> Result<i64, HnkError> {
    let mut total = 0i64;
    for child in children {
        let child_h = h.saturating_sub(1).min(child.max_h());
        total += child.max_k_at_h(child_h)? as i64;
    }
    Ok(total)
}

/// Balanced divide-and-conquer over `children`. `index` is a tree-walk
/// index (`2*parent+1` for a left recursion, `2*parent+2` for a right one)
/// used purely to key the memo; it carries no semantic meaning beyond
/// disambiguating split sub-calls at the same `(h, k)`.
fn aggregate_split(
    node: &ArchetypeNode,
    children: &[Archetype],
    index: usize,
    h: u32,
    k: i64,
    n_split: u32,
) -> Result<Count, HnkError> {
    if k < 0 {
        return Ok(Count::zero());
    }
    if k == 0 {
        return Ok(Count::one());
    }
    if n_split == 1 {
        let child_h = h.saturating_sub(1).min(children[0].max_h());
        return children[0].count(child_h, k);
    }

    if let Some(c) = node.memo_split(h, k as u32, index) {
        return Ok(c);
    }

    let value = if n_split == 3 {
        let (left, right) = children.split_at(2);
        let max_k_left = children_max_k(left, h)? + 1;
        let max_k_right = children_max_k(right, h)?;
        let lo = (k - 1 - max_k_right).max(1);
        let hi = k.min(max_k_left);
        let mut acc = Count::zero();
        let mut j = lo;
        while j <= hi {
            let a = aggregate_split(node, left, 2 * index + 1, h, j, 2)?;
            let child_h = h.saturating_sub(1).min(right[0].max_h());
            let b = right[0].count(child_h, k - j)?;
            acc += &a * &b;
            j += 1;
        }
        acc
    } else {
        let i_left = ((n_split + 1) / 2) as usize;
        let (left, right) = children.split_at(i_left);
        let max_k_left = children_max_k(left, h)?;
        let max_k_right = children_max_k(right, h)?;
        let lo = (k - 1 - max_k_right).max(0);
        let hi = (k - 1).min(max_k_left);
        let mut acc = Count::zero();
        let mut j = lo;
        while j <= hi {
            let a = aggregate_split(node, left, 2 * index + 1, h, j + 1, i_left as u32)?;
            let b = aggregate_split(node, right, 2 * index + 2, h, k - j, n_split - i_left as u32)?;
            acc += &a * &b;
            j += 1;
        }
        acc
    };

    node.store_split(h, k as u32, index, value.clone());
    Ok(value)
}

//! The memoised counter node: a single tree archetype's height/size table.

use crate::error::HnkError;
use crate::kernels;
use hnk_bignum::Count;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A lazily-populated two-level table, indexed first by an outer key
/// (height), then by an inner key (arrangement size, or a split bin).
/// Rows materialise on first write; both dimensions grow as needed.
#[derive(Clone)]
struct LazyGrid<T> {
    rows: Vec<Option<Vec<Option<T>>>>,
}

impl<T: Clone> LazyGrid<T> {
    fn new(outer_len: usize) -> Self {
        LazyGrid { rows: vec![None; outer_len] }
    }

    fn get(&self, outer: usize, inner: usize) -> Option<T> {
        self.rows.get(outer)?.as_ref()?.get(inner)?.clone()
    }

    fn set(&mut self, outer: usize, inner: usize, value: T) {
        if self.rows.len() <= outer {
            self.rows.resize(outer + 1, None);
        }
        let row = self.rows[outer].get_or_insert_with(Vec::new);
        if row.len() <= inner {
            row.resize(inner + 1, None);
        }
        row[inner] = Some(value);
    }

    fn row_present(&self, outer: usize) -> bool {
        self.rows.get(outer).is_some_and(Option::is_some)
    }

    fn highest_set(&self, outer: usize) -> Option<usize> {
        self.rows.get(outer)?.as_ref()?.iter().rposition(Option::is_some)
    }
}

/// Behavioural policy selecting how a node's children are combined.
///
/// N-ary archetypes recurse through `n` copies of a single subtree; an
/// unattached child defaults to self-recursion (the canonical
/// binary/ternary/quaternary shapes). Aggregate archetypes hold an explicit,
/// possibly heterogeneous, list of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Nary(u8),
    Aggregate,
}

/// A tree archetype: a memoised `h(h, k)` table plus 0..N child archetypes.
///
/// Shared and referenced via [`Archetype`] (`Rc<ArchetypeNode>`). A node may
/// be its own child (self-recursion, set via [`ArchetypeNode::set_subtree`]
/// or [`ArchetypeNode::set_self_recursive`]); the resulting `Rc` cycle is
/// intentional and is never torn down mid-process.
pub struct ArchetypeNode {
    max_h: u32,
    max_k: u32,
    max_split: u32,
    n_splits: u32,
    policy: Policy,
    self_ref: Weak<ArchetypeNode>,
    children: RefCell<Vec<Archetype>>,
    max_k_at_h: RefCell<Vec<Option<u32>>>,
    max_k_at_h_storage: RefCell<Vec<Option<u32>>>,
    counts: RefCell<LazyGrid<Count>>,
    split_counts: RefCell<Vec<Option<LazyGrid<Count>>>>,
    ratios: RefCell<LazyGrid<f64>>,
}

/// Reference-counted handle to a counter node. Graphs are built once (by
/// test fixtures or a consuming crate) and queried for the rest of the
/// process's life; ordinary `Rc`/`Drop` semantics handle teardown.
pub type Archetype = Rc<ArchetypeNode>;

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        32 - (n - 1).leading_zeros()
    }
}

impl ArchetypeNode {
    /// Builds an n-ary archetype with arity `n` in `1..=9`. The single
    /// child slot starts empty; leave it unset for self-recursion, or call
    /// [`set_subtree`](Self::set_subtree) to attach a distinct child
    /// (e.g. the 3/4 Cartesian fixture's root pointing at a quaternary
    /// child).
    pub fn new_nary(n: u8, max_h: u32, max_k: u32) -> Result<Archetype, HnkError> {
        if !(1..=9).contains(&n) {
            return Err(HnkError::InvalidArgument {
                reason: format!("n-ary arity {n} out of range 1..=9"),
            });
        }
        if max_h == 0 || max_k == 0 {
            return Err(HnkError::InvalidArgument {
                reason: "max_h and max_k must be strictly positive".into(),
            });
        }
        let n_splits = ceil_log2(n as u32);
        let archetype = Rc::new_cyclic(|weak| ArchetypeNode {
            max_h,
            max_k,
            max_split: n as u32,
            n_splits,
            policy: Policy::Nary(n),
            self_ref: weak.clone(),
            children: RefCell::new(Vec::new()),
            max_k_at_h: RefCell::new(vec![None; max_h as usize + 1]),
            max_k_at_h_storage: RefCell::new(vec![None; max_h as usize + 1]),
            counts: RefCell::new(LazyGrid::new(max_h as usize + 1)),
            split_counts: RefCell::new(vec![None; max_h as usize + 1]),
            ratios: RefCell::new(LazyGrid::new(max_h as usize + 1)),
        });
        tracing::debug!(n, max_h, max_k, "constructed n-ary archetype");
        Ok(archetype)
    }

    /// Builds an aggregate archetype over an explicit, possibly
    /// heterogeneous list of 2 or more children.
    pub fn new_aggregate(children: Vec<Archetype>, max_h: u32, max_k: u32) -> Result<Archetype, HnkError> {
        if children.len() < 2 {
            return Err(HnkError::InvalidArgument {
                reason: "aggregate archetype needs at least 2 children".into(),
            });
        }
        if max_h == 0 || max_k == 0 {
            return Err(HnkError::InvalidArgument {
                reason: "max_h and max_k must be strictly positive".into(),
            });
        }
        let max_split = children.len() as u32;
        let n_splits = max_split.next_power_of_two();
        let archetype = Rc::new_cyclic(|weak| ArchetypeNode {
            max_h,
            max_k,
            max_split,
            n_splits,
            policy: Policy::Aggregate,
            self_ref: weak.clone(),
            children: RefCell::new(children),
            max_k_at_h: RefCell::new(vec![None; max_h as usize + 1]),
            max_k_at_h_storage: RefCell::new(vec![None; max_h as usize + 1]),
            counts: RefCell::new(LazyGrid::new(max_h as usize + 1)),
            split_counts: RefCell::new(vec![None; max_h as usize + 1]),
            ratios: RefCell::new(LazyGrid::new(max_h as usize + 1)),
        });
        tracing::debug!(max_h, max_k, n_children = max_split, "constructed aggregate archetype");
        Ok(archetype)
    }

    /// Builds an aggregate archetype with `n_children` empty child slots,
    /// to be filled in afterwards via
    /// [`set_aggregate_subtree`](Self::set_aggregate_subtree) — the only
    /// way to build a self-referential aggregate (one or more children
    /// pointing back at the aggregate itself), since those children can't
    /// exist yet at the time a plain `Vec<Archetype>` would need to be
    /// assembled.
    pub fn new_aggregate_empty(n_children: usize, max_h: u32, max_k: u32) -> Result<Archetype, HnkError> {
        if n_children < 2 {
            return Err(HnkError::InvalidArgument {
                reason: "aggregate archetype needs at least 2 children".into(),
            });
        }
        if max_h == 0 || max_k == 0 {
            return Err(HnkError::InvalidArgument {
                reason: "max_h and max_k must be strictly positive".into(),
            });
        }
        let max_split = n_children as u32;
        let n_splits = max_split.next_power_of_two();
        let archetype = Rc::new_cyclic(|weak| ArchetypeNode {
            max_h,
            max_k,
            max_split,
            n_splits,
            policy: Policy::Aggregate,
            self_ref: weak.clone(),
            children: RefCell::new(Vec::with_capacity(n_children)),
            max_k_at_h: RefCell::new(vec![None; max_h as usize + 1]),
            max_k_at_h_storage: RefCell::new(vec![None; max_h as usize + 1]),
            counts: RefCell::new(LazyGrid::new(max_h as usize + 1)),
            split_counts: RefCell::new(vec![None; max_h as usize + 1]),
            ratios: RefCell::new(LazyGrid::new(max_h as usize + 1)),
        });
        tracing::debug!(max_h, max_k, n_children, "constructed empty aggregate archetype");
        Ok(archetype)
    }

    /// Fills slot `index` of an aggregate built via
    /// [`new_aggregate_empty`](Self::new_aggregate_empty). Slots must be
    /// filled in order (`index` equal to the current child count appends;
    /// any earlier index overwrites).
    pub fn set_aggregate_subtree(&self, index: usize, child: Archetype) -> Result<(), HnkError> {
        if !matches!(self.policy, Policy::Aggregate) {
            return Err(HnkError::InvalidArgument {
                reason: "set_aggregate_subtree only applies to aggregate archetypes".into(),
            });
        }
        let mut children = self.children.borrow_mut();
        if index < children.len() {
            children[index] = child;
        } else if index == children.len() {
            children.push(child);
        } else {
            return Err(HnkError::InvalidArgument {
                reason: format!("aggregate child slots must be filled in order, got index {index} with {} filled", children.len()),
            });
        }
        Ok(())
    }

    /// Attaches (or replaces) the single child of an n-ary archetype.
    pub fn set_subtree(&self, child: Archetype) -> Result<(), HnkError> {
        if !matches!(self.policy, Policy::Nary(_)) {
            return Err(HnkError::InvalidArgument {
                reason: "set_subtree only applies to n-ary archetypes".into(),
            });
        }
        let mut children = self.children.borrow_mut();
        children.clear();
        children.push(child);
        Ok(())
    }

    /// Closes the self-recursion cycle: this archetype becomes its own
    /// child, the default shape used by the canonical binary/ternary/...
    /// fixtures.
    pub fn set_self_recursive(&self) -> Result<(), HnkError> {
        let me = self.self_handle();
        self.set_subtree(me)
    }

    fn self_handle(&self) -> Archetype {
        self.self_ref.upgrade().expect("archetype freed while still reachable")
    }

    pub(crate) fn effective_child(&self) -> Archetype {
        match self.children.borrow().first() {
            Some(child) => Rc::clone(child),
            None => self.self_handle(),
        }
    }

    pub fn max_h(&self) -> u32 {
        self.max_h
    }

    pub fn max_k(&self) -> u32 {
        self.max_k
    }

    pub fn max_split(&self) -> u32 {
        self.max_split
    }

    pub fn n_splits(&self) -> u32 {
        self.n_splits
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn child(&self, i: usize) -> Option<Archetype> {
        self.children.borrow().get(i).cloned()
    }

    pub(crate) fn children_snapshot(&self) -> Vec<Archetype> {
        self.children.borrow().clone()
    }

    fn check_height(&self, h: u32) -> Result<(), HnkError> {
        if h > self.max_h {
            Err(HnkError::InvalidArgument {
                reason: format!("height {h} exceeds max_h {}", self.max_h),
            })
        } else {
            Ok(())
        }
    }

    /// The largest arrangement size embeddable at height `h`, uncapped by
    /// `max_k` (see [`max_k_at_h_storage`](Self::max_k_at_h_storage) for the
    /// capped, storage-bounding variant).
    pub fn max_k_at_h(&self, h: u32) -> Result<u32, HnkError> {
        self.check_height(h)?;
        if let Some(v) = self.max_k_at_h.borrow()[h as usize] {
            return Ok(v);
        }
        let value = if h == 0 {
            1
        } else {
            match self.policy {
                Policy::Nary(n) => {
                    let child = self.effective_child();
                    let child_h = (h - 1).min(child.max_h());
                    n as u32 * child.max_k_at_h(child_h)? + 1
                }
                Policy::Aggregate => {
                    let mut total = 0u32;
                    for child in self.children.borrow().iter() {
                        let child_h = (h - 1).min(child.max_h());
                        total += child.max_k_at_h(child_h)?;
                    }
                    total + 1
                }
            }
        };
        self.max_k_at_h.borrow_mut()[h as usize] = Some(value);
        Ok(value)
    }

    /// `max_k_at_h(h)` clamped by `max_k`; bounds how wide the memo rows
    /// allocated at height `h` actually are.
    pub fn max_k_at_h_storage(&self, h: u32) -> Result<u32, HnkError> {
        self.check_height(h)?;
        if let Some(v) = self.max_k_at_h_storage.borrow()[h as usize] {
            return Ok(v);
        }
        let storage = self.max_k_at_h(h)?.min(self.max_k);
        self.max_k_at_h_storage.borrow_mut()[h as usize] = Some(storage);
        Ok(storage)
    }

    /// `h(h, k)`: the number of distinct arrangements of size `k`
    /// embeddable at height `h`. Negative or out-of-range `k` returns
    /// `Count::zero()`, never an error — MCMC callers legitimately probe
    /// past the bound.
    pub fn count(&self, h: u32, k: i64) -> Result<Count, HnkError> {
        if k < 0 {
            return Ok(Count::zero());
        }
        self.check_height(h)?;
        let k_u = k as u32;
        if k_u == 0 {
            return Ok(Count::one());
        }
        if h == 0 {
            return Ok(if k == 1 { Count::one() } else { Count::zero() });
        }
        if let Some(c) = self.memo_count(h, k_u) {
            return Ok(c);
        }
        let value = match self.policy {
            Policy::Nary(n) => kernels::nary_count(self, n, h, k_u)?,
            Policy::Aggregate => kernels::aggregate_count(self, h, k_u)?,
        };
        tracing::debug!(h, k = k_u, value = %value, "memoised count cell");
        self.store_count(h, k_u, value.clone());
        Ok(value)
    }

    pub fn is_count_memoised(&self, h: u32, k: u32) -> bool {
        self.counts.borrow().get(h as usize, k as usize).is_some()
    }

    pub fn highest_memoised_k(&self, h: u32) -> Result<u32, HnkError> {
        self.check_height(h)?;
        self.counts
            .borrow()
            .highest_set(h as usize)
            .map(|k| k as u32)
            .ok_or_else(|| HnkError::InvariantViolation {
                reason: format!("height {h} has no memoised counts yet"),
            })
    }

    /// `count(h, k+1) / count(h, k)`, rounded to `f64`. `k ==
    /// max_k_at_h_storage(h)` is treated as having numerator zero.
    pub fn ratio_kplus1(&self, h: u32, k: u32) -> Result<f64, HnkError> {
        self.check_height(h)?;
        if let Some(r) = self.ratios.borrow().get(h as usize, k as usize) {
            return Ok(r);
        }
        let storage = self.max_k_at_h_storage(h)?;
        let numerator = if k >= storage {
            Count::zero()
        } else {
            self.count(h, k as i64 + 1)?
        };
        let denominator = self.count(h, k as i64)?;
        let value = if denominator.is_zero() {
            0.0
        } else {
            numerator.to_f64_approx() / denominator.to_f64_approx()
        };
        self.ratios.borrow_mut().set(h as usize, k as usize, value);
        Ok(value)
    }

    pub(crate) fn memo_count(&self, h: u32, k: u32) -> Option<Count> {
        self.counts.borrow().get(h as usize, k as usize)
    }

    pub(crate) fn store_count(&self, h: u32, k: u32, value: Count) {
        self.counts.borrow_mut().set(h as usize, k as usize, value);
    }

    pub(crate) fn memo_split(&self, h: u32, k: u32, idx: usize) -> Option<Count> {
        self.split_counts.borrow().get(h as usize)?.as_ref()?.get(k as usize, idx)
    }

    pub(crate) fn store_split(&self, h: u32, k: u32, idx: usize, value: Count) {
        let mut outer = self.split_counts.borrow_mut();
        let slot = outer[h as usize].get_or_insert_with(|| LazyGrid::new(0));
        slot.set(k as usize, idx, value);
    }

    pub(crate) fn store_ratio(&self, h: u32, k: u32, value: f64) {
        self.ratios.borrow_mut().set(h as usize, k as usize, value);
    }

    pub(crate) fn store_max_k_at_h(&self, h: u32, value: u32) {
        self.max_k_at_h.borrow_mut()[h as usize] = Some(value);
    }

    pub(crate) fn counts_row_present(&self, h: u32) -> bool {
        self.counts.borrow().row_present(h as usize)
    }

    pub(crate) fn split_row_present(&self, h: u32) -> bool {
        self.split_counts.borrow().get(h as usize).is_some_and(Option::is_some)
    }

    pub(crate) fn split_cell_present(&self, h: u32, k: u32) -> bool {
        self.split_counts
            .borrow()
            .get(h as usize)
            .and_then(Option::as_ref)
            .is_some_and(|grid| grid.row_present(k as usize))
    }

    pub(crate) fn ratios_row_present(&self, h: u32) -> bool {
        self.ratios.borrow().row_present(h as usize)
    }
}

impl fmt::Debug for ArchetypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeNode")
            .field("policy", &self.policy)
            .field("max_h", &self.max_h)
            .field("max_k", &self.max_k)
            .field("max_split", &self.max_split)
            .field("n_children", &self.children.borrow().len())
            .finish()
    }
}

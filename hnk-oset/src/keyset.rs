use crate::error::{OsetError, OsetResult};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};

/// A sorted set of `i32` keys, binned by an integer "depth" label.
///
/// Within a depth, keys are kept strictly ascending; insertion is
/// idempotent (re-inserting an existing key at its depth is a no-op).
#[derive(Debug, Default, Clone)]
pub struct KeySet {
    by_depth: BTreeMap<i32, Vec<i32>>,
    total: usize,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` at `depth`. Returns `true` if a new entry was added.
    pub fn insert(&mut self, key: i32, depth: i32) -> bool {
        let bucket = self.by_depth.entry(depth).or_default();
        match bucket.binary_search(&key) {
            Ok(_) => false,
            Err(pos) => {
                bucket.insert(pos, key);
                self.total += 1;
                true
            }
        }
    }

    /// Removes `key` from `depth`. Returns `true` if it was present.
    pub fn remove(&mut self, key: i32, depth: i32) -> bool {
        let Some(bucket) = self.by_depth.get_mut(&depth) else {
            return false;
        };
        match bucket.binary_search(&key) {
            Ok(pos) => {
                bucket.remove(pos);
                self.total -= 1;
                if bucket.is_empty() {
                    self.by_depth.remove(&depth);
                }
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, key: i32, depth: i32) -> bool {
        self.by_depth
            .get(&depth)
            .is_some_and(|bucket| bucket.binary_search(&key).is_ok())
    }

    pub fn depth_count(&self, depth: i32) -> usize {
        self.by_depth.get(&depth).map_or(0, Vec::len)
    }

    pub fn total_count(&self) -> usize {
        self.total
    }

    pub fn nonempty_count(&self, max_depth: i32) -> usize {
        self.by_depth.range(..=max_depth).count()
    }

    pub fn restricted_total_count(&self, max_depth: i32) -> usize {
        self.by_depth
            .range(..=max_depth)
            .map(|(_, bucket)| bucket.len())
            .sum()
    }

    pub fn nth_element(&self, depth: i32, n: usize) -> OsetResult<i32> {
        let bucket = self
            .by_depth
            .get(&depth)
            .ok_or(OsetError::EmptyDepth(depth))?;
        bucket
            .get(n)
            .copied()
            .ok_or(OsetError::IndexOutOfRange { depth, index: n, count: bucket.len() })
    }

    /// Uniform choice of a key within `depth`. Returns `(key, probability)`.
    pub fn choose_index(&self, depth: i32, u: f64) -> OsetResult<(i32, f64)> {
        let bucket = self
            .by_depth
            .get(&depth)
            .filter(|b| !b.is_empty())
            .ok_or(OsetError::EmptyDepth(depth))?;
        let n = (u * bucket.len() as f64) as usize;
        let n = n.min(bucket.len() - 1);
        Ok((bucket[n], 1.0 / bucket.len() as f64))
    }

    /// Uniform choice of a depth among the non-empty depths `<= max_depth`.
    /// Returns `(depth, candidate_depth_count)`.
    pub fn choose_depth(&self, u: f64, max_depth: i32) -> OsetResult<(i32, usize)> {
        if max_depth < 0 {
            return Err(OsetError::InvalidMaxDepth(max_depth));
        }
        let candidates: Vec<i32> = self.by_depth.range(..=max_depth).map(|(d, _)| *d).collect();
        if candidates.is_empty() {
            return Err(OsetError::NoCandidates(max_depth));
        }
        let idx = ((u * candidates.len() as f64) as usize).min(candidates.len() - 1);
        Ok((candidates[idx], candidates.len()))
    }

    /// Uniform choice of a key across all depths `<= max_depth`.
    /// Returns `(depth, key, probability)`.
    pub fn choose_index_globally(&self, u: f64, max_depth: i32) -> OsetResult<(i32, i32, f64)> {
        if max_depth < 0 {
            return Err(OsetError::InvalidMaxDepth(max_depth));
        }
        let total = self.restricted_total_count(max_depth);
        if total == 0 {
            return Err(OsetError::NoCandidates(max_depth));
        }
        let mut idx = ((u * total as f64) as usize).min(total - 1);
        for (depth, bucket) in self.by_depth.range(..=max_depth) {
            if idx < bucket.len() {
                return Ok((*depth, bucket[idx], 1.0 / total as f64));
            }
            idx -= bucket.len();
        }
        unreachable!("idx exhausted restricted_total_count without finding a key")
    }

    /// `Σ depthᵅ` over every member at a depth `<= max_depth`.
    pub fn weighted_sum(&self, alpha: f64, max_depth: i32) -> f64 {
        self.by_depth
            .range(..=max_depth)
            .map(|(depth, bucket)| (*depth as f64).powf(alpha) * bucket.len() as f64)
            .sum()
    }

    /// Choice of a key with probability proportional to `depthᵅ`.
    /// `alpha == 0.0` falls through to the uniform global choice.
    /// Returns `(depth, key, probability)`.
    pub fn choose_index_weighted(&self, u: f64, max_depth: i32, alpha: f64) -> OsetResult<(i32, i32, f64)> {
        if alpha == 0.0 {
            return self.choose_index_globally(u, max_depth);
        }
        if max_depth < 0 {
            return Err(OsetError::InvalidMaxDepth(max_depth));
        }
        let sum = self.weighted_sum(alpha, max_depth);
        if sum <= 0.0 {
            return Err(OsetError::NoCandidates(max_depth));
        }
        let mut acc = 0.0;
        for (depth, bucket) in self.by_depth.range(..=max_depth) {
            let w = (*depth as f64).powf(alpha);
            for &key in bucket {
                acc += w / sum;
                if acc > u {
                    return Ok((*depth, key, w / sum));
                }
            }
        }
        // Rounding may leave a residual below `u`; return the last member.
        self.by_depth
            .range(..=max_depth)
            .last()
            .and_then(|(depth, bucket)| bucket.last().map(|&key| (*depth, key, (*depth as f64).powf(alpha) / sum)))
            .ok_or(OsetError::NoCandidates(max_depth))
    }

    /// Serialises per-depth counts followed by each depth's keys in order.
    pub fn write(&self, sink: &mut impl Write) -> io::Result<()> {
        sink.write_all(&(self.by_depth.len() as u32).to_ne_bytes())?;
        for (depth, bucket) in &self.by_depth {
            sink.write_all(&depth.to_ne_bytes())?;
            sink.write_all(&(bucket.len() as u32).to_ne_bytes())?;
            for key in bucket {
                sink.write_all(&key.to_ne_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read(source: &mut impl Read) -> io::Result<Self> {
        let mut set = KeySet::new();
        let mut buf4 = [0u8; 4];

        source.read_exact(&mut buf4)?;
        let depth_count = u32::from_ne_bytes(buf4);

        for _ in 0..depth_count {
            source.read_exact(&mut buf4)?;
            let depth = i32::from_ne_bytes(buf4);

            source.read_exact(&mut buf4)?;
            let key_count = u32::from_ne_bytes(buf4);

            for _ in 0..key_count {
                source.read_exact(&mut buf4)?;
                let key = i32::from_ne_bytes(buf4);
                set.insert(key, depth);
            }
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_and_keeps_ascending_order() {
        let mut s = KeySet::new();
        assert!(s.insert(5, 0));
        assert!(s.insert(1, 0));
        assert!(s.insert(3, 0));
        assert!(!s.insert(3, 0));
        assert_eq!(s.depth_count(0), 3);
        assert_eq!(s.nth_element(0, 0).unwrap(), 1);
        assert_eq!(s.nth_element(0, 1).unwrap(), 3);
        assert_eq!(s.nth_element(0, 2).unwrap(), 5);
    }

    #[test]
    fn remove_reports_membership() {
        let mut s = KeySet::new();
        s.insert(10, 2);
        assert!(s.remove(10, 2));
        assert!(!s.remove(10, 2));
        assert_eq!(s.depth_count(2), 0);
        assert_eq!(s.total_count(), 0);
    }

    #[test]
    fn empty_depth_is_reported_precisely() {
        use assert_matches::assert_matches;
        let s = KeySet::new();
        assert_matches!(s.nth_element(0, 0), Err(OsetError::EmptyDepth(0)));
        assert_matches!(s.choose_depth(0.5, -1), Err(OsetError::InvalidMaxDepth(-1)));
    }

    #[test]
    fn restricted_counts_respect_max_depth() {
        let mut s = KeySet::new();
        s.insert(1, 0);
        s.insert(2, 1);
        s.insert(3, 2);
        assert_eq!(s.restricted_total_count(1), 2);
        assert_eq!(s.nonempty_count(1), 2);
        assert_eq!(s.restricted_total_count(2), 3);
    }

    #[test]
    fn choose_index_globally_is_exhaustive_and_normalised() {
        let mut s = KeySet::new();
        s.insert(1, 0);
        s.insert(2, 0);
        s.insert(3, 1);
        for i in 0..100 {
            let u = i as f64 / 100.0;
            let (_, _, p) = s.choose_index_globally(u, 1).unwrap();
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn weighted_choose_falls_through_to_uniform_at_alpha_zero() {
        let mut s = KeySet::new();
        s.insert(1, 5);
        s.insert(2, 9);
        let (_, key, p) = s.choose_index_weighted(0.99, 10, 0.0).unwrap();
        let (_, key2, p2) = s.choose_index_globally(0.99, 10).unwrap();
        assert_eq!(key, key2);
        assert_eq!(p, p2);
    }

    #[test]
    fn write_read_round_trip() {
        let mut s = KeySet::new();
        s.insert(5, 0);
        s.insert(1, 0);
        s.insert(7, 3);
        let mut buf = Vec::new();
        s.write(&mut buf).unwrap();
        let restored = KeySet::read(&mut &buf[..]).unwrap();
        assert_eq!(restored.total_count(), s.total_count());
        assert_eq!(restored.nth_element(0, 0).unwrap(), 1);
        assert_eq!(restored.nth_element(3, 0).unwrap(), 7);
    }

    proptest::proptest! {
        #[test]
        fn depth_rows_stay_ascending_under_arbitrary_inserts(
            ops in proptest::collection::vec((-100i32..100, 0i32..5), 0..200)
        ) {
            let mut s = KeySet::new();
            for (key, depth) in ops {
                s.insert(key, depth);
            }
            for depth in 0..5 {
                let mut prev = None;
                for i in 0..s.depth_count(depth) {
                    let key = s.nth_element(depth, i).unwrap();
                    if let Some(p) = prev {
                        proptest::prop_assert!(key > p);
                    }
                    prev = Some(key);
                }
            }
        }
    }
}

//! Running median over a multiset of floats
//!
//! Two heaps split the values: `lower` (max-heap) holds the smaller half and
//! `higher` (min-heap) the larger half, with `lower` holding the extra value
//! when the count is odd. Removing an arbitrary value is lazy: it is recorded
//! in the pending multiset of the heap that holds it and dropped once it
//! surfaces at that heap's top. Both heaps are pruned after every public
//! operation, so their tops are always live values.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// f64 ordered by `total_cmp`
#[derive(Clone, Copy, Debug)]
struct Value(f64);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// `-0.0` and `0.0` must land on the same pending key
fn normalize(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Lower,
    Higher,
}

/// Median of a changing multiset, amortized O(log n) per operation
#[derive(Clone, Debug, Default)]
pub struct RunningMedian {
    lower: BinaryHeap<Value>,
    higher: BinaryHeap<Reverse<Value>>,
    lower_len: usize,
    higher_len: usize,
    lower_pending: HashMap<u64, usize>,
    higher_pending: HashMap<u64, usize>,
}

impl RunningMedian {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live values
    #[must_use]
    pub const fn len(&self) -> usize {
        self.lower_len + self.higher_len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current median, 0 when empty
    #[must_use]
    pub fn median(&self) -> f64 {
        let lower = self.lower.peek().map(|v| v.0);
        let higher = self.higher.peek().map(|v| v.0.0);
        match (lower, higher) {
            (Some(lo), Some(hi)) if self.lower_len == self.higher_len => 0.5 * (lo + hi),
            (Some(lo), _) => lo,
            _ => 0.0,
        }
    }

    /// Add a value
    pub fn add(&mut self, value: f64) {
        self.insert(normalize(value));
        self.rebalance();
    }

    /// Remove one occurrence of a previously added value
    ///
    /// Removing a value that was never added corrupts the split; a delete
    /// on an empty median is ignored.
    pub fn delete(&mut self, value: f64) {
        self.remove(normalize(value));
        self.rebalance();
    }

    /// Replace one occurrence of `old` by `new` in a single pass
    pub fn update(&mut self, old: f64, new: f64) {
        let (old, new) = (normalize(old), normalize(new));
        if old.to_bits() == new.to_bits() {
            return;
        }
        self.remove(old);
        self.insert(new);
        self.rebalance();
    }

    fn lower_top(&self) -> Option<f64> {
        self.lower.peek().map(|v| v.0)
    }

    fn higher_top(&self) -> Option<f64> {
        self.higher.peek().map(|v| v.0.0)
    }

    fn insert(&mut self, value: f64) {
        let to_lower = match (self.lower_top(), self.higher_top()) {
            (Some(lo), _) => value <= lo,
            (None, Some(hi)) => value <= hi,
            (None, None) => true,
        };

        if to_lower {
            self.lower.push(Value(value));
            self.lower_len += 1;
        } else {
            self.higher.push(Reverse(Value(value)));
            self.higher_len += 1;
        }
    }

    fn remove(&mut self, value: f64) {
        let side = match self.lower_top() {
            Some(lo) if value <= lo => Side::Lower,
            _ if self.higher_len > 0 => Side::Higher,
            _ => return,
        };

        match side {
            Side::Lower => {
                if self.lower_top().is_some_and(|lo| lo.to_bits() == value.to_bits()) {
                    self.lower.pop();
                } else {
                    *self.lower_pending.entry(value.to_bits()).or_insert(0) += 1;
                }
                self.lower_len -= 1;
                self.prune_lower();
            }
            Side::Higher => {
                if self.higher_top().is_some_and(|hi| hi.to_bits() == value.to_bits()) {
                    self.higher.pop();
                } else {
                    *self.higher_pending.entry(value.to_bits()).or_insert(0) += 1;
                }
                self.higher_len -= 1;
                self.prune_higher();
            }
        }
    }

    fn rebalance(&mut self) {
        while self.lower_len > self.higher_len + 1 {
            let Some(v) = self.lower.pop() else { break };
            self.lower_len -= 1;
            self.prune_lower();
            self.higher.push(Reverse(v));
            self.higher_len += 1;
        }
        while self.lower_len < self.higher_len {
            let Some(Reverse(v)) = self.higher.pop() else { break };
            self.higher_len -= 1;
            self.prune_higher();
            self.lower.push(v);
            self.lower_len += 1;
        }
    }

    fn prune_lower(&mut self) {
        while let Some(top) = self.lower.peek() {
            if !take_pending(&mut self.lower_pending, top.0) {
                break;
            }
            self.lower.pop();
        }
    }

    fn prune_higher(&mut self) {
        while let Some(Reverse(top)) = self.higher.peek() {
            if !take_pending(&mut self.higher_pending, top.0) {
                break;
            }
            self.higher.pop();
        }
    }
}

/// Consume one pending deletion of `value`, if any
fn take_pending(pending: &mut HashMap<u64, usize>, value: f64) -> bool {
    let key = value.to_bits();
    match pending.get_mut(&key) {
        Some(count) => {
            *count -= 1;
            if *count == 0 {
                pending.remove(&key);
            }
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reference_median(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        }
    }

    #[test]
    fn test_empty_median_is_zero() {
        let mut median = RunningMedian::new();
        assert!(median.is_empty());
        assert_eq!(median.median(), 0.0);

        median.delete(3.0);
        assert!(median.is_empty());
    }

    #[test]
    fn test_even_and_odd_counts() {
        let mut median = RunningMedian::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            median.add(v);
        }
        assert_eq!(median.median(), 2.5);

        median.delete(1.0);
        assert_eq!(median.len(), 3);
        assert_eq!(median.median(), 3.0);
    }

    #[test]
    fn test_duplicates_and_zeroes() {
        let mut median = RunningMedian::new();
        for _ in 0..5 {
            median.add(0.0);
        }
        median.update(-0.0, 7.0);
        median.update(0.0, 7.0);
        assert_eq!(median.median(), 0.0);

        median.update(0.0, 7.0);
        assert_eq!(median.median(), 7.0);
        assert_eq!(median.len(), 5);
    }

    #[test]
    fn test_update_with_equal_values_is_noop() {
        let mut median = RunningMedian::new();
        median.add(2.0);
        median.add(4.0);
        median.update(4.0, 4.0);
        assert_eq!(median.len(), 2);
        assert_eq!(median.median(), 3.0);
    }

    #[test]
    fn test_matches_sorted_reference() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut median = RunningMedian::new();
        let mut values: Vec<f64> = Vec::new();

        for _ in 0..5000 {
            let op = rng.gen_range(0..3);
            if op == 0 || values.is_empty() {
                let v = f64::from(rng.gen_range(0..20_u32));
                median.add(v);
                values.push(v);
            } else {
                let idx = rng.gen_range(0..values.len());
                if op == 1 {
                    let v = values.swap_remove(idx);
                    median.delete(v);
                } else {
                    let new = f64::from(rng.gen_range(0..20_u32)) / 2.0;
                    median.update(values[idx], new);
                    values[idx] = new;
                }
            }

            assert_eq!(median.len(), values.len());
            assert!((median.median() - reference_median(&values)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_update_equals_delete_then_add() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut by_update = RunningMedian::new();
        let mut by_pair = RunningMedian::new();
        let mut values: Vec<f64> = (0..64).map(|_| f64::from(rng.gen_range(0..10_u32))).collect();
        for &v in &values {
            by_update.add(v);
            by_pair.add(v);
        }

        for _ in 0..1000 {
            let idx = rng.gen_range(0..values.len());
            let new = f64::from(rng.gen_range(0..10_u32));
            by_update.update(values[idx], new);
            by_pair.delete(values[idx]);
            by_pair.add(new);
            values[idx] = new;

            assert_eq!(by_update.len(), by_pair.len());
            assert_eq!(by_update.median(), by_pair.median());
        }
    }
}

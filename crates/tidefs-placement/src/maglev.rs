//! Maglev consistent hashing lookup table
//!
//! See "Maglev: A Fast and Reliable Software Network Load Balancer"
//! (Eisenbud et al., NSDI 2016), section 3.4.

use crate::hashing::{hash_crc, hash_mixed};
use crate::primes::next_prime_of;

/// Lookup table mapping `M` slots onto `N` nodes
///
/// Every node owns either `floor(M/N)` or `ceil(M/N)` slots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaglevTable {
    entry: Vec<usize>,
}

impl MaglevTable {
    /// Populate the table for `names`, with `M = next_prime_of(N * multiplier)`
    ///
    /// An empty node list yields an empty table.
    #[must_use]
    pub fn build<S: AsRef<str>>(multiplier: usize, names: &[S]) -> Self {
        let n = names.len();
        if n == 0 {
            return Self::default();
        }

        let m = next_prime_of(n.saturating_mul(multiplier.max(1)));
        let m64 = m as u64;

        // preference list of node i: (offset_i + j * skip_i) mod M
        let prefs: Vec<(u64, u64)> = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let offset = hash_mixed(name) % m64;
                let skip = hash_crc(name) % (m64 - 1) + 1;
                (offset, skip)
            })
            .collect();

        let mut next = vec![0_u64; n];
        let mut entry: Vec<Option<usize>> = vec![None; m];
        let mut filled = 0;

        'fill: loop {
            for (node, &(offset, skip)) in prefs.iter().enumerate() {
                let slot = loop {
                    let candidate = ((offset + next[node] * skip) % m64) as usize;
                    next[node] += 1;
                    if entry[candidate].is_none() {
                        break candidate;
                    }
                };
                entry[slot] = Some(node);
                filled += 1;
                if filled == m {
                    break 'fill;
                }
            }
        }

        Self {
            entry: entry.into_iter().flatten().collect(),
        }
    }

    /// Node owning `slot`, wrapping around the table
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<usize> {
        if self.entry.is_empty() {
            return None;
        }
        Some(self.entry[slot % self.entry.len()])
    }

    /// Number of slots (`M`)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    /// The raw slot-to-node table
    #[must_use]
    pub fn entries(&self) -> &[usize] {
        &self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{i}:9200")).collect()
    }

    #[test]
    fn test_empty_table() {
        let table = MaglevTable::build::<String>(100, &[]);
        assert!(table.is_empty());
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn test_table_is_valid_and_balanced() {
        for n in [1, 2, 3, 4, 7, 10, 32] {
            for multiplier in [1, 10, 100] {
                let table = MaglevTable::build(multiplier, &nodes(n));
                assert_eq!(table.len(), next_prime_of(n * multiplier));

                let mut counts = vec![0_usize; n];
                for &node in table.entries() {
                    assert!(node < n);
                    counts[node] += 1;
                }
                let min = counts.iter().min().unwrap();
                let max = counts.iter().max().unwrap();
                assert!(max - min <= 1, "n={n} multiplier={multiplier} counts={counts:?}");
            }
        }
    }

    #[test]
    fn test_table_is_deterministic() {
        let a = MaglevTable::build(10, &nodes(5));
        let b = MaglevTable::build(10, &nodes(5));
        assert_eq!(a, b);
        assert_eq!(a.get(a.len() + 3), a.get(3));
    }
}

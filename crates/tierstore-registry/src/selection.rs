//! Starting-index selection for tier group probes.
//!
//! Round robin uses an atomic counter that is never reset, so concurrent
//! probes spread across members without a lock. Random draws uniformly from
//! the thread-local generator.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use tierstore_core::SelectionKind;
use tracing::info;

/// Chooses where a probe over `n` candidates starts.
#[derive(Debug)]
pub enum SelectionPolicy {
    RoundRobin { counter: AtomicUsize },
    Random,
}

impl SelectionPolicy {
    pub fn round_robin() -> Self {
        SelectionPolicy::RoundRobin {
            counter: AtomicUsize::new(0),
        }
    }

    pub fn from_kind(kind: SelectionKind) -> Self {
        match kind {
            SelectionKind::RoundRobin => {
                info!("round robin block selection");
                Self::round_robin()
            }
            SelectionKind::Random => {
                info!("random block selection");
                SelectionPolicy::Random
            }
        }
    }

    /// Where the next probe over `count` members starts; `None` for an
    /// empty group.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        match self {
            SelectionPolicy::RoundRobin { counter } => {
                Some(counter.fetch_add(1, Ordering::Relaxed) % count)
            }
            SelectionPolicy::Random => Some(rand::rng().random_range(0..count)),
        }
    }

    pub fn kind(&self) -> SelectionKind {
        match self {
            SelectionPolicy::RoundRobin { .. } => SelectionKind::RoundRobin,
            SelectionPolicy::Random => SelectionKind::Random,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::round_robin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_counter_is_shared_by_every_group() {
        // Groups of different sizes draw from the same policy, so a probe in
        // one group advances the start of the next probe in another.
        let policy = SelectionPolicy::round_robin();
        let starts: Vec<_> = [3, 5, 3, 2, 5, 3]
            .into_iter()
            .map(|members| policy.next(members).unwrap())
            .collect();
        assert_eq!(starts, vec![0, 1, 2, 1, 4, 2]);
    }

    #[test]
    fn empty_group_has_no_start() {
        assert_eq!(SelectionPolicy::round_robin().next(0), None);
        assert_eq!(SelectionPolicy::Random.next(0), None);
    }

    #[test]
    fn random_stays_in_range() {
        let policy = SelectionPolicy::Random;
        for _ in 0..1000 {
            assert!(policy.next(5).unwrap() < 5);
        }
        assert_eq!(policy.next(1), Some(0));
    }

    #[test]
    fn from_kind_maps_config() {
        assert_eq!(
            SelectionPolicy::from_kind(SelectionKind::RoundRobin).kind(),
            SelectionKind::RoundRobin
        );
        assert_eq!(
            SelectionPolicy::from_kind(SelectionKind::Random).kind(),
            SelectionKind::Random
        );
    }

    #[test]
    fn concurrent_starts_spread_evenly() {
        use std::sync::Arc;
        use std::thread;

        let policy = Arc::new(SelectionPolicy::round_robin());
        let mut handles = vec![];

        for _ in 0..4 {
            let policy = policy.clone();
            handles.push(thread::spawn(move || {
                let mut hits = [0usize; 4];
                for _ in 0..100 {
                    hits[policy.next(4).unwrap()] += 1;
                }
                hits
            }));
        }

        let mut totals = [0usize; 4];
        for h in handles {
            for (total, hit) in totals.iter_mut().zip(h.join().unwrap()) {
                *total += hit;
            }
        }

        // 400 draws from one shared counter land exactly 100 per index.
        assert_eq!(totals, [100; 4]);
    }
}

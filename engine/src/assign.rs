//! Round-robin assignment of batch positions to destinations.

use std::path::{Path, PathBuf};

use crate::model::{Batch, Distribution};

/// Cycles through a fixed destination sequence.
///
/// Each copy task owns its own `RoundRobin`; the counter is never shared.
#[derive(Debug)]
pub struct RoundRobin<'a> {
    destinations: &'a [PathBuf],
    counter: usize,
}

impl<'a> RoundRobin<'a> {
    /// Start the cycle at `start` (taken modulo the destination count).
    pub fn new(destinations: &'a [PathBuf], start: usize) -> Self {
        let counter = if destinations.is_empty() {
            0
        } else {
            start % destinations.len()
        };
        RoundRobin {
            destinations,
            counter,
        }
    }

    /// Round-robin for `batch` under the given distribution.
    pub fn for_batch(destinations: &'a [PathBuf], batch: &Batch, distribution: Distribution) -> Self {
        let start = match distribution {
            Distribution::PerBatch => 0,
            Distribution::Continuous => batch.first_position,
        };
        Self::new(destinations, start)
    }
}

/// Yields `(index, destination)` forever, or nothing if there are no
/// destinations.
impl<'a> Iterator for RoundRobin<'a> {
    type Item = (usize, &'a Path);

    fn next(&mut self) -> Option<Self::Item> {
        let destination = self.destinations.get(self.counter)?;
        let index = self.counter;
        self.counter = (self.counter + 1) % self.destinations.len();
        Some((index, destination.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dests(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn batch(index: usize, first_position: usize, len: usize) -> Batch {
        Batch {
            index,
            first_position,
            files: (0..len).map(|i| PathBuf::from(format!("f{}", i))).collect(),
        }
    }

    #[test]
    fn test_cycles_modulo_destination_count() {
        let d = dests(&["A", "B", "C"]);
        let picked: Vec<usize> = RoundRobin::new(&d, 0).take(7).map(|(i, _)| i).collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_per_batch_restarts_at_first_destination() {
        let d = dests(&["A", "B"]);
        let third = batch(2, 4, 1);

        let mut rr = RoundRobin::for_batch(&d, &third, Distribution::PerBatch);
        assert_eq!(rr.next(), Some((0, Path::new("A"))));
        assert_eq!(rr.next(), Some((1, Path::new("B"))));
    }

    #[test]
    fn test_continuous_follows_global_position() {
        let d = dests(&["A", "B", "C"]);
        // positions 4, 5 of the whole job
        let second = batch(1, 4, 2);

        let picked: Vec<&Path> = RoundRobin::for_batch(&d, &second, Distribution::Continuous)
            .take(2)
            .map(|(_, p)| p)
            .collect();
        assert_eq!(picked, vec![Path::new("B"), Path::new("C")]);
    }

    #[test]
    fn test_single_destination_always_chosen() {
        let d = dests(&["only"]);
        assert!(RoundRobin::new(&d, 5).take(4).all(|(i, _)| i == 0));
    }

    #[test]
    fn test_no_destinations() {
        let d: Vec<PathBuf> = Vec::new();
        assert_eq!(RoundRobin::new(&d, 3).next(), None);
    }
}

//! Zone choice for instances that do not name a zone.
//!
//! Production picks uniformly at random to spread machines across the
//! region's zones; tests inject a seeded source.

use rand::seq::SliceRandom;
use std::fmt;

/// Picks one zone out of a region's zone list
pub trait ZoneSelector: Send + Sync + fmt::Debug {
    /// `None` only when `zones` is empty
    fn choose(&self, zones: &[String]) -> Option<String>;
}

/// Uniform random choice using the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomZoneSelector;

impl ZoneSelector for RandomZoneSelector {
    fn choose(&self, zones: &[String]) -> Option<String> {
        zones.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Reproducible choice from a seeded RNG
#[cfg(test)]
#[derive(Debug)]
pub struct SeededZoneSelector {
    rng: std::sync::Mutex<rand::rngs::StdRng>,
}

#[cfg(test)]
impl SeededZoneSelector {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            rng: std::sync::Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }
}

#[cfg(test)]
impl ZoneSelector for SeededZoneSelector {
    fn choose(&self, zones: &[String]) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        zones.choose(&mut *rng).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<String> {
        ["cn-bj2-02", "cn-bj2-03", "cn-bj2-04", "cn-bj2-05"].iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_random_choice_is_a_member() {
        let zones = zones();
        for _ in 0..20 {
            let zone = RandomZoneSelector.choose(&zones).unwrap();
            assert!(zones.contains(&zone));
        }
        assert_eq!(RandomZoneSelector.choose(&[]), None);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let zones = zones();
        let a = SeededZoneSelector::new(7);
        let b = SeededZoneSelector::new(7);
        let first: Vec<_> = (0..8).map(|_| a.choose(&zones)).collect();
        let second: Vec<_> = (0..8).map(|_| b.choose(&zones)).collect();
        assert_eq!(first, second);
    }
}

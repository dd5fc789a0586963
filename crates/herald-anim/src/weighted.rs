#![forbid(unsafe_code)]

//! Weighted random selection.
//!
//! A [`WeightedPool`] keeps entries in a cumulative-weight table. A draw picks
//! `u` uniformly from `[0, total)` and returns the first entry whose cumulative
//! weight is strictly greater than `u`, so each entry is chosen with
//! probability `weight / total`.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `weight <= 0` or NaN | Entry ignored |
//! | Weight would overflow the total to infinity | Entry ignored |
//! | `select()` on empty pool | Panics: the alternative set is misconfigured |
//! | `try_select()` on empty pool | Returns `None` |

use rand::Rng;

/// A set of values drawn with probability proportional to their weight.
#[derive(Debug, Clone)]
pub struct WeightedPool<T> {
    /// `(cumulative weight, value)`, strictly increasing in weight.
    entries: Vec<(f64, T)>,
    total: f64,
}

impl<T> Default for WeightedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WeightedPool<T> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            total: 0.0,
        }
    }

    /// Add `value` with `weight`. Non-positive weights, and weights that
    /// would push the total past `f64::MAX`, are ignored.
    pub fn add(&mut self, weight: f64, value: T) -> &mut Self {
        let total = self.total + weight;
        if weight > 0.0 && total.is_finite() {
            self.total = total;
            self.entries.push((total, value));
        }
        self
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, weight: f64, value: T) -> Self {
        self.add(weight, value);
        self
    }

    /// Sum of all accepted weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose cumulative interval contains `u`, i.e. the first with
    /// cumulative weight strictly greater than `u`.
    fn lookup(&self, u: f64) -> Option<&T> {
        let idx = self.entries.partition_point(|(cumulative, _)| *cumulative <= u);
        self.entries
            .get(idx)
            .or_else(|| self.entries.last())
            .map(|(_, value)| value)
    }

    /// Draw one value, or `None` if the pool is empty.
    pub fn try_select_with<R: Rng>(&self, rng: &mut R) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }
        self.lookup(rng.gen_range(0.0..self.total))
    }

    /// Draw one value using the thread RNG, or `None` if the pool is empty.
    pub fn try_select(&self) -> Option<&T> {
        self.try_select_with(&mut rand::thread_rng())
    }

    /// Draw one value.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    pub fn select_with<R: Rng>(&self, rng: &mut R) -> &T {
        match self.try_select_with(rng) {
            Some(value) => value,
            None => panic!("WeightedPool::select called on an empty pool"),
        }
    }

    /// Draw one value using the thread RNG.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    pub fn select(&self) -> &T {
        self.select_with(&mut rand::thread_rng())
    }
}

impl<T> FromIterator<(f64, T)> for WeightedPool<T> {
    fn from_iter<I: IntoIterator<Item = (f64, T)>>(iter: I) -> Self {
        let mut pool = Self::new();
        for (weight, value) in iter {
            pool.add(weight, value);
        }
        pool
    }
}

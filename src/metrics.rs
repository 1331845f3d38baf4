//! Randomized metric generation for the simulated handlers.
//!
//! Every fabricated number in a server log record comes from a
//! `MetricSource`, so tests can swap in a seeded or fixed source.
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A source of fabricated metric values.
pub trait MetricSource: Send {
    /// Uniform integer in `low..high`. Returns `low` when the range is empty.
    fn range(&mut self, low: u64, high: u64) -> u64;

    /// `true` with the given probability, clamped to `0.0..=1.0`. NaN is never true.
    fn chance(&mut self, probability: f64) -> bool;

    /// Uniform float in `0.0..1.0`.
    fn fraction(&mut self) -> f64;

    /// Random lowercase base36 string of `len` characters.
    fn alphanumeric(&mut self, len: usize) -> String;
}

/// `MetricSource` backed by a `StdRng`.
pub struct RandomMetrics {
    rng: StdRng,
}

impl RandomMetrics {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MetricSource for RandomMetrics {
    fn range(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn fraction(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn alphanumeric(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| BASE36[self.rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }
}

/// Shared, thread-safe handle to a `MetricSource`.
#[derive(Clone)]
pub struct Metrics {
    source: Arc<Mutex<Box<dyn MetricSource>>>,
}

impl Metrics {
    pub fn new(source: impl MetricSource + 'static) -> Self {
        Self {
            source: Arc::new(Mutex::new(Box::new(source))),
        }
    }

    /// Seeded when `seed` is given, otherwise seeded from entropy.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(RandomMetrics::seeded(seed)),
            None => Self::new(RandomMetrics::from_entropy()),
        }
    }

    pub fn range(&self, low: u64, high: u64) -> u64 {
        self.source.lock().range(low, high)
    }

    pub fn chance(&self, probability: f64) -> bool {
        self.source.lock().chance(probability)
    }

    pub fn fraction(&self) -> f64 {
        self.source.lock().fraction()
    }

    pub fn alphanumeric(&self, len: usize) -> String {
        self.source.lock().alphanumeric(len)
    }

    /// Dotted IPv4 address with each octet in `0..255`.
    pub fn ip_address(&self) -> String {
        let mut source = self.source.lock();
        format!(
            "{}.{}.{}.{}",
            source.range(0, 255),
            source.range(0, 255),
            source.range(0, 255),
            source.range(0, 255)
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::from_seed(None)
    }
}

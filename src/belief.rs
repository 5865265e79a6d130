//! Per-element score beliefs.
//!
//! Each element keeps two things:
//! - a Welford accumulator over every finite score it has seen (for reporting), and
//! - once warm-up is over, a normal posterior over its expected score.
//!
//! The posterior uses the known-variance normal-normal conjugate update: the observation
//! variance is fixed to the global warm-up variance, the posterior starts at the global
//! prior and every observation (warm-up scores first, then search scores) shrinks it.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::BeliefError;

/// Floor applied to every standard deviation fed into the posterior.
pub const MIN_STD: f64 = 1e-6;

/// Online mean/variance (Welford's recurrence).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunningStats {
    pub count: u64,
    pub mean: f64,
    m2: f64,
    pub min: f64,
    pub max: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Fold in one observation. Non-finite values are ignored.
    pub fn push(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Population variance (zero with fewer than two observations).
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut s = RunningStats::new();
        for x in iter {
            s.push(x);
        }
        s
    }
}

/// Normal posterior over an element's expected score.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Posterior {
    pub mean: f64,
    pub variance: f64,
    /// Fixed observation noise variance.
    pub obs_variance: f64,
}

impl Posterior {
    fn update(&mut self, x: f64) {
        let denom = self.variance + self.obs_variance;
        self.mean = (self.obs_variance * self.mean + self.variance * x) / denom;
        self.variance = self.variance * self.obs_variance / denom;
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Score belief for one element.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ElementBelief {
    stats: RunningStats,
    warmup_scores: Vec<f64>,
    posterior: Option<Posterior>,
}

impl ElementBelief {
    pub fn new() -> Self {
        Self {
            stats: RunningStats::new(),
            warmup_scores: Vec::new(),
            posterior: None,
        }
    }

    /// Record a score from a combination this element took part in.
    ///
    /// Before initialization the score is held back for [`Self::initialize_from_prior`];
    /// afterwards it refines the posterior directly. Non-finite scores are ignored.
    pub fn add_score(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.stats.push(x);
        match self.posterior.as_mut() {
            Some(p) => p.update(x),
            None => self.warmup_scores.push(x),
        }
    }

    /// Seed the posterior from the global prior and fold in the warm-up scores.
    ///
    /// Elements with more warm-up observations end up closer to their own mean and with
    /// a narrower spread.
    pub fn initialize_from_prior(
        &mut self,
        prior_mean: f64,
        prior_std: f64,
    ) -> Result<(), BeliefError> {
        if self.warmup_scores.is_empty() {
            return Err(BeliefError::NoObservations);
        }
        let std = if prior_std.is_finite() {
            prior_std.max(MIN_STD)
        } else {
            MIN_STD
        };
        let var = std * std;
        let mut p = Posterior {
            mean: prior_mean,
            variance: var,
            obs_variance: var,
        };
        for &x in &self.warmup_scores {
            p.update(x);
        }
        self.posterior = Some(p);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.posterior.is_some()
    }

    pub fn current_mean(&self) -> Option<f64> {
        self.posterior.map(|p| p.mean)
    }

    pub fn current_std(&self) -> Option<f64> {
        self.posterior.map(|p| p.std_dev())
    }

    pub fn posterior(&self) -> Option<Posterior> {
        self.posterior
    }

    /// Observed-score statistics across both phases.
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Number of scores recorded before initialization.
    pub fn warmup_count(&self) -> usize {
        self.warmup_scores.len()
    }

    /// Draw a plausible score from the posterior. `None` before initialization.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<f64> {
        let p = self.posterior?;
        let std = p.std_dev();
        if !(std.is_finite() && std > 0.0) {
            return Some(p.mean);
        }
        match Normal::new(p.mean, std) {
            Ok(dist) => Some(dist.sample(rng)),
            Err(_) => Some(p.mean),
        }
    }
}

/// One selectable option for a slot.
#[derive(Debug, Clone)]
pub struct Element<P> {
    pub name: String,
    /// Opaque structural payload handed to the assembler.
    pub payload: P,
    pub belief: ElementBelief,
}

impl<P> Element<P> {
    pub fn new(name: impl Into<String>, payload: P) -> Self {
        Self {
            name: name.into(),
            payload,
            belief: ElementBelief::new(),
        }
    }
}

//! Two-phase Thompson-sampling search over a combinatorial product space.
//!
//! ```text
//! Uninitialized --warm_up--> WarmingUp --> Ready --search--> Searching --> Done
//!                                                   ^                        |
//!                                                   +-------- search --------+
//! ```
//!
//! - **Warm-up**: every element of every slot is paired `trials` times with partners drawn
//!   uniformly from the legal choices of the other slots. The finite scores give a global
//!   prior; each element folds its own warm-up scores into it. Elements without a single
//!   finite score are retired.
//! - **Search**: each cycle visits the slots in a fresh random order, draws one value per
//!   legal element from its posterior and lets the [`SelectionMode`] pick. Every full
//!   combination is committed to the tracker before it is evaluated, so failed
//!   combinations are never retried either.
//!
//! Calling [`SearchEngine::search`] again continues from the current tracker and beliefs.

use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::belief::{RunningStats, MIN_STD};
use crate::eval::{Assembler, Evaluator};
use crate::policy::pick;
use crate::tracker::{CombinationTracker, Selection};
use crate::{ConfigError, Element, SearchConfig, SearchError, SelectionMode};

/// Lifecycle of a [`SearchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Uninitialized,
    WarmingUp,
    Ready,
    Searching,
    Done,
}

/// One successfully scored combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit<Q> {
    pub score: f64,
    /// Element names joined by `_`, in slot order.
    pub name: String,
    pub product: Q,
    pub choices: Vec<usize>,
}

/// Best hit under `mode` (highest for maximize modes, lowest otherwise).
pub fn best_hit<Q>(mode: SelectionMode, hits: &[Hit<Q>]) -> Option<&Hit<Q>> {
    hits.iter().fold(None, |best: Option<&Hit<Q>>, h| match best {
        Some(b) if !mode.better(h.score, b.score) => Some(b),
        _ => Some(h),
    })
}

/// Global prior established by warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prior {
    pub mean: f64,
    pub std: f64,
}

/// Mutable search state: elements with their beliefs, the tracker and the phase.
#[derive(Debug, Clone)]
pub struct SearchState<P> {
    pub slots: Vec<Vec<Element<P>>>,
    pub tracker: CombinationTracker,
    phase: Phase,
    prior: Option<Prior>,
    // Boltzmann temperature: warm-up score spread.
    temperature: f64,
}

impl<P> SearchState<P> {
    pub fn new(slots: Vec<Vec<Element<P>>>) -> Self {
        let tracker = CombinationTracker::new(slots.iter().map(Vec::len).collect());
        Self {
            slots,
            tracker,
            phase: Phase::Uninitialized,
            prior: None,
            temperature: 1.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn prior(&self) -> Option<Prior> {
        self.prior
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn name_of(&self, choices: &[usize]) -> String {
        choices
            .iter()
            .enumerate()
            .map(|(slot, &c)| self.slots[slot][c].name.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Results of [`SearchEngine::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome<Q> {
    pub warmup: Vec<Hit<Q>>,
    pub search: Vec<Hit<Q>>,
}

/// Thompson-sampling search engine.
pub struct SearchEngine<P, Q, A, E> {
    config: SearchConfig,
    state: SearchState<P>,
    assembler: A,
    evaluator: E,
    rng: StdRng,
    _product: PhantomData<fn() -> Q>,
}

impl<P, Q, A, E> SearchEngine<P, Q, A, E>
where
    A: Assembler<P, Q>,
    E: Evaluator<Q>,
{
    /// Create an engine. Every slot must hold at least one element.
    pub fn new(
        config: SearchConfig,
        slots: Vec<Vec<Element<P>>>,
        assembler: A,
        evaluator: E,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if slots.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "slots".to_string(),
                message: "at least one slot is required".to_string(),
            }
            .into());
        }
        if let Some(i) = slots.iter().position(Vec::is_empty) {
            return Err(ConfigError::InvalidField {
                field: format!("slots[{i}]"),
                message: "slot has no elements".to_string(),
            }
            .into());
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = SearchState::new(slots);
        info!(
            slots = state.slots.len(),
            products = %format!("{:.2e}", state.tracker.total_combinations() as f64),
            mode = %config.mode,
            "search space loaded"
        );
        Ok(Self {
            config,
            state,
            assembler,
            evaluator,
            rng,
            _product: PhantomData,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> &SearchState<P> {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn slots(&self) -> &[Vec<Element<P>>] {
        &self.state.slots
    }

    pub fn tracker(&self) -> &CombinationTracker {
        &self.state.tracker
    }

    /// Size of the full product space, saturating at `u128::MAX`.
    pub fn num_products(&self) -> u128 {
        self.state.tracker.total_combinations()
    }

    /// Warm up with the configured trial count, then search for the configured cycles.
    pub fn run(&mut self) -> Result<RunOutcome<Q>, SearchError> {
        let warmup = self.warm_up(self.config.warmup_trials)?;
        let search = self.search(self.config.search_cycles)?;
        Ok(RunOutcome { warmup, search })
    }

    /// Calibrate beliefs by pairing every element with random legal partners.
    pub fn warm_up(&mut self, trials_per_element: usize) -> Result<Vec<Hit<Q>>, SearchError> {
        self.expect_phase("warm up", &[Phase::Uninitialized])?;
        self.state.phase = Phase::WarmingUp;
        let n = self.state.slots.len();
        let mut hits = Vec::new();

        for i in 0..n {
            let size = self.state.slots[i].len();
            for j in 0..size {
                for _ in 0..trials_per_element {
                    let mut selection = vec![Selection::Unfilled; n];
                    selection[i] = Selection::ToFill;
                    if self.state.tracker.disallowed(&selection, i)?.contains(&j) {
                        continue;
                    }
                    selection[i] = Selection::Chosen(j);
                    for p in (0..n).filter(|&p| p != i) {
                        selection[p] = Selection::ToFill;
                        let legal = self.state.tracker.legal_choices(&selection, p)?;
                        if legal.is_empty() {
                            return Err(SearchError::ConsistencyViolation { slot: p });
                        }
                        let choice = legal[self.rng.random_range(0..legal.len())];
                        selection[p] = Selection::Chosen(choice);
                    }
                    self.state.tracker.commit(&selection)?;
                    let choices = chosen(&selection);
                    if let Some(hit) = self.evaluate(choices) {
                        hits.push(hit);
                    }
                }
            }
            if !self.config.hide_progress {
                info!(slot = i + 1, of = n, "warm-up slot finished");
            }
        }

        self.initialize_beliefs(&hits)?;
        self.state.phase = Phase::Ready;
        Ok(hits)
    }

    fn initialize_beliefs(&mut self, hits: &[Hit<Q>]) -> Result<(), SearchError> {
        let stats: RunningStats = hits.iter().map(|h| h.score).collect();
        if stats.is_empty() {
            warn!("warm-up produced no finite scores");
        } else {
            info!(
                cnt = stats.count,
                mean = %format!("{:.4}", stats.mean),
                std = %format!("{:.4}", stats.std_dev()),
                min = %format!("{:.4}", stats.min),
                max = %format!("{:.4}", stats.max),
                "warm-up score stats"
            );
        }
        let prior = Prior {
            mean: stats.mean,
            std: stats.std_dev(),
        };
        self.state.temperature = prior.std.max(MIN_STD);
        self.state.prior = (!stats.is_empty()).then_some(prior);

        for (i, elements) in self.state.slots.iter_mut().enumerate() {
            for (j, element) in elements.iter_mut().enumerate() {
                if element
                    .belief
                    .initialize_from_prior(prior.mean, prior.std)
                    .is_err()
                {
                    info!(
                        slot = i,
                        element = %element.name,
                        "retiring element with no successful warm-up evaluations"
                    );
                    self.state.tracker.retire(i, j)?;
                }
            }
        }

        if let Some(best) = best_hit(self.config.mode, hits) {
            info!(score = %format!("{:.3}", best.score), name = %best.name, "top score found during warm-up");
        }
        Ok(())
    }

    /// Run `num_cycles` Thompson-sampling cycles and return the scored hits.
    ///
    /// Stops early once every combination has been committed.
    pub fn search(&mut self, num_cycles: usize) -> Result<Vec<Hit<Q>>, SearchError> {
        self.expect_phase("search", &[Phase::Ready, Phase::Done])?;
        for (slot, elements) in self.state.slots.iter().enumerate() {
            let retired = self.state.tracker.retired(slot).map_or(0, |r| r.len());
            if retired >= elements.len() {
                return Err(SearchError::SlotExhausted { slot });
            }
        }
        self.state.phase = Phase::Searching;

        let n = self.state.slots.len();
        let mode = self.config.mode;
        let mut order: Vec<usize> = (0..n).collect();
        let mut out = Vec::new();

        for cycle in 0..num_cycles {
            if self.state.tracker.is_exhausted() {
                info!(cycle, "every combination has been evaluated; stopping early");
                break;
            }
            order.shuffle(&mut self.rng);
            let mut selection = vec![Selection::Unfilled; n];
            for &slot in &order {
                selection[slot] = Selection::ToFill;
                let disallowed = self.state.tracker.disallowed(&selection, slot)?;
                let mut values = Vec::with_capacity(self.state.slots[slot].len());
                for (k, element) in self.state.slots[slot].iter().enumerate() {
                    // Disallowed entries are skipped by `pick`; no draw needed.
                    let v = if disallowed.contains(&k) {
                        f64::NAN
                    } else {
                        element.belief.sample(&mut self.rng).unwrap_or(f64::NAN)
                    };
                    values.push(v);
                }
                let Some(choice) = pick(
                    mode,
                    &values,
                    &disallowed,
                    self.state.temperature,
                    &mut self.rng,
                ) else {
                    return Err(SearchError::ConsistencyViolation { slot });
                };
                selection[slot] = Selection::Chosen(choice);
            }
            self.state.tracker.commit(&selection)?;
            if let Some(hit) = self.evaluate(chosen(&selection)) {
                out.push(hit);
            }
            if !self.config.hide_progress {
                debug!(cycle, of = num_cycles, "search cycle");
            }
            if cycle % self.config.report_every == 0 {
                if let Some(best) = best_hit(mode, &out) {
                    info!(
                        iteration = cycle,
                        score = %format!("{:.2}", best.score),
                        name = %best.name,
                        "best score so far"
                    );
                }
            }
        }

        self.state.phase = Phase::Done;
        Ok(out)
    }

    // Assemble and score one committed combination; feeds beliefs on success.
    fn evaluate(&mut self, choices: Vec<usize>) -> Option<Hit<Q>> {
        let name = self.state.name_of(&choices);
        let parts: Vec<&P> = choices
            .iter()
            .enumerate()
            .map(|(slot, &c)| &self.state.slots[slot][c].payload)
            .collect();
        let Some(product) = self.assembler.assemble(&parts) else {
            debug!(name = %name, "assembly failed");
            return None;
        };
        let score = self.evaluator.evaluate(&product, &name);
        if !score.is_finite() {
            debug!(name = %name, "evaluation returned a non-finite score");
            return None;
        }
        for (slot, &c) in choices.iter().enumerate() {
            self.state.slots[slot][c].belief.add_score(score);
        }
        Some(Hit {
            score,
            name,
            product,
            choices,
        })
    }

    fn expect_phase(&self, action: &'static str, allowed: &[Phase]) -> Result<(), SearchError> {
        if allowed.contains(&self.state.phase) {
            Ok(())
        } else {
            Err(SearchError::InvalidPhase {
                action,
                phase: self.state.phase,
            })
        }
    }
}

fn chosen(selection: &[Selection]) -> Vec<usize> {
    selection.iter().filter_map(|s| s.chosen()).collect()
}

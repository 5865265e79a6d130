//! `combsearch`: Thompson-sampling search over combinatorial product spaces.
//!
//! A *product* is assembled by picking exactly one element from each of several ordered
//! slots, and an expensive external function scores it. The number of products is the
//! product of the slot sizes, so exhaustive scoring is out of the question. `combsearch`
//! keeps a normal belief per element, samples from those beliefs to pick promising
//! combinations, and never evaluates the same combination twice.
//!
//! **Pieces:**
//! - [`ElementBelief`]: online score statistics plus a normal-normal posterior per element.
//! - [`CombinationTracker`]: which choices are still legal for a slot given a partial
//!   selection; commits full combinations and retires elements, without ever enumerating
//!   the product space.
//! - [`SelectionMode`] / [`pick`]: greedy max/min or Boltzmann-weighted draws.
//! - [`SearchEngine`]: warm-up (uniform random partners, builds the prior) followed by
//!   any number of search rounds.
//!
//! The caller supplies the [`Assembler`] (payloads → product, or nothing) and the
//! [`Evaluator`] (product → score, non-finite for "could not score"). Closures work for
//! both.
//!
//! ```rust
//! use combsearch::{Element, SearchConfig, SearchEngine, SelectionMode};
//!
//! let slots: Vec<Vec<Element<u32>>> = (0..2)
//!     .map(|s| (0..4).map(|i| Element::new(format!("s{s}_{i}"), i)).collect())
//!     .collect();
//! let assemble = |parts: &[&u32]| -> Option<u32> { Some(parts.iter().copied().sum()) };
//! let evaluate = |q: &u32, _name: &str| *q as f64;
//!
//! let cfg = SearchConfig { mode: SelectionMode::Maximize, seed: Some(7), ..SearchConfig::default() };
//! let mut engine = SearchEngine::new(cfg, slots, assemble, evaluate).unwrap();
//! engine.warm_up(1).unwrap();
//! let hits = engine.search(5).unwrap();
//! assert!(hits.len() <= 5);
//! ```
//!
//! **Goals:**
//! - **Seedable**: one RNG per engine, so a fixed seed reproduces a run.
//! - **No repeats**: every full combination is committed exactly once, failed or not.
//! - **Scales with slot arity**: legality queries cost per-slot work, not product-size work.
//!
//! **Non-goals:**
//! - Persisting search state across runs.
//! - Parallel or distributed evaluation.
//! - Knowing anything about what a product actually is.

mod error;
pub use error::*;

mod alloc;
pub use alloc::*;

mod belief;
pub use belief::*;

mod tracker;
pub use tracker::*;

mod policy;
pub use policy::*;

mod eval;
pub use eval::*;

mod engine;
pub use engine::*;

pub mod config;
pub use config::{LoggingConfig, RunConfig, SearchConfig};

pub mod logging;

pub mod source;

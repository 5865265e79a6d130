//! Selection policies: turn one sampled value per element into a single pick.
//!
//! The policy is a closed set of modes dispatched by [`pick`]; there is no stored
//! callable. Disallowed indices are skipped outright rather than masked with a sentinel.
//!
//! The Boltzmann variants follow Zhao, Nittinger & Tyrchan, *Enhanced Thompson Sampling
//! by Roulette Wheel Selection for Screening Ultra-Large Combinatorial Libraries*
//! (bioRxiv 2024.05.16.594622): instead of committing to the single best noisy draw, an
//! element is drawn with probability proportional to `exp(value / temperature)`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::alloc::softmax_indexed;
use crate::belief::MIN_STD;
use crate::ConfigError;

/// How the next element of a slot is chosen from sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Greatest sampled value.
    #[default]
    Maximize,
    /// Least sampled value.
    Minimize,
    /// Softmax-weighted draw favouring high values.
    MaximizeBoltzmann,
    /// Softmax-weighted draw favouring low values.
    MinimizeBoltzmann,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 4] = [
        SelectionMode::Maximize,
        SelectionMode::Minimize,
        SelectionMode::MaximizeBoltzmann,
        SelectionMode::MinimizeBoltzmann,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::Maximize => "maximize",
            SelectionMode::Minimize => "minimize",
            SelectionMode::MaximizeBoltzmann => "maximize_boltzmann",
            SelectionMode::MinimizeBoltzmann => "minimize_boltzmann",
        }
    }

    /// True for the two modes that look for high scores.
    pub fn maximizes(self) -> bool {
        matches!(
            self,
            SelectionMode::Maximize | SelectionMode::MaximizeBoltzmann
        )
    }

    /// True if `a` is a better score than `b` under this mode.
    pub fn better(self, a: f64, b: f64) -> bool {
        if self.maximizes() {
            a > b
        } else {
            a < b
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SelectionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownMode(s.to_string()))
    }
}

/// Pick one index of `values`, skipping anything in `disallowed`.
///
/// `temperature` is only read by the Boltzmann modes and is floored at
/// [`MIN_STD`]. Non-finite values are treated as absent. Returns `None` when no legal,
/// finite entry is left.
pub fn pick<R: Rng>(
    mode: SelectionMode,
    values: &[f64],
    disallowed: &BTreeSet<usize>,
    temperature: f64,
    rng: &mut R,
) -> Option<usize> {
    let legal = values
        .iter()
        .copied()
        .enumerate()
        .filter(|(i, v)| !disallowed.contains(i) && v.is_finite());
    match mode {
        SelectionMode::Maximize => extremum(legal, |a, b| a > b),
        SelectionMode::Minimize => extremum(legal, |a, b| a < b),
        SelectionMode::MaximizeBoltzmann => boltzmann(legal.collect(), temperature, rng),
        SelectionMode::MinimizeBoltzmann => {
            boltzmann(legal.map(|(i, v)| (i, -v)).collect(), temperature, rng)
        }
    }
}

// Ties keep the lowest index.
fn extremum<I>(legal: I, better: impl Fn(f64, f64) -> bool) -> Option<usize>
where
    I: Iterator<Item = (usize, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in legal {
        match best {
            Some((_, bv)) if !better(v, bv) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn boltzmann<R: Rng>(
    scores: Vec<(usize, f64)>,
    temperature: f64,
    rng: &mut R,
) -> Option<usize> {
    let last = scores.last()?.0;
    let t = if temperature.is_finite() {
        temperature.max(MIN_STD)
    } else {
        1.0
    };
    let probs = softmax_indexed(&scores, t);
    let r: f64 = rng.random();
    let mut cdf = 0.0;
    for &(i, p) in &probs {
        cdf += p;
        if r < cdf {
            return Some(i);
        }
    }
    // Numerical fallback: last index with any weight.
    probs
        .iter()
        .rev()
        .find(|&&(_, p)| p > 0.0)
        .map(|&(i, _)| i)
        .or(Some(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn none() -> BTreeSet<usize> {
        BTreeSet::new()
    }

    #[test]
    fn parses_the_four_modes() {
        for m in SelectionMode::ALL {
            assert_eq!(m.as_str().parse::<SelectionMode>().unwrap(), m);
        }
        assert!(matches!(
            "maximise".parse::<SelectionMode>(),
            Err(ConfigError::UnknownMode(s)) if s == "maximise"
        ));
    }

    #[test]
    fn extremum_skips_disallowed() {
        let mut rng = StdRng::seed_from_u64(0);
        let vals = [1.0, 9.0, 5.0, -3.0];
        let dis = BTreeSet::from([1, 3]);
        assert_eq!(pick(SelectionMode::Maximize, &vals, &dis, 1.0, &mut rng), Some(2));
        assert_eq!(pick(SelectionMode::Minimize, &vals, &dis, 1.0, &mut rng), Some(0));
        assert_eq!(pick(SelectionMode::Maximize, &vals, &none(), 1.0, &mut rng), Some(1));
        assert_eq!(pick(SelectionMode::Minimize, &vals, &none(), 1.0, &mut rng), Some(3));
    }

    #[test]
    fn disallowed_entries_are_absent_not_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let vals = [-5.0, -2.0, 0.0];
        let dis = BTreeSet::from([2]);
        assert_eq!(pick(SelectionMode::Maximize, &vals, &dis, 1.0, &mut rng), Some(1));
    }

    #[test]
    fn empty_legal_set_yields_none() {
        let mut rng = StdRng::seed_from_u64(0);
        let dis = BTreeSet::from([0, 1]);
        for m in SelectionMode::ALL {
            assert_eq!(pick(m, &[1.0, 2.0], &dis, 1.0, &mut rng), None);
        }
        assert_eq!(pick(SelectionMode::Maximize, &[], &none(), 1.0, &mut rng), None);
    }

    #[test]
    fn boltzmann_favours_the_right_end() {
        let mut rng = StdRng::seed_from_u64(7);
        let vals = [0.0, 3.0];
        let mut hi = 0;
        let mut lo = 0;
        for _ in 0..2000 {
            if pick(SelectionMode::MaximizeBoltzmann, &vals, &none(), 1.0, &mut rng) == Some(1) {
                hi += 1;
            }
            if pick(SelectionMode::MinimizeBoltzmann, &vals, &none(), 1.0, &mut rng) == Some(0) {
                lo += 1;
            }
        }
        // p = e^3 / (1 + e^3) ~= 0.953
        assert!(hi > 1800, "hi={hi}");
        assert!(lo > 1800, "lo={lo}");
    }

    #[test]
    fn boltzmann_with_zero_temperature_still_picks() {
        let mut rng = StdRng::seed_from_u64(1);
        let vals = [1.0, 1.0 + 1e-3];
        let got = pick(SelectionMode::MaximizeBoltzmann, &vals, &none(), 0.0, &mut rng);
        assert_eq!(got, Some(1));
    }

    proptest! {
        #[test]
        fn pick_is_legal_and_extremal(
            vals in proptest::collection::vec(-1.0e3f64..1.0e3f64, 1..12),
            mask in proptest::collection::vec(any::<bool>(), 12),
            seed in any::<u64>(),
        ) {
            let dis: BTreeSet<usize> = (0..vals.len()).filter(|&i| mask[i]).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let legal: Vec<usize> = (0..vals.len()).filter(|i| !dis.contains(i)).collect();
            for m in SelectionMode::ALL {
                let got = pick(m, &vals, &dis, 10.0, &mut rng);
                if legal.is_empty() {
                    prop_assert_eq!(got, None);
                    continue;
                }
                let i = got.unwrap();
                prop_assert!(!dis.contains(&i));
                match m {
                    SelectionMode::Maximize => {
                        prop_assert!(legal.iter().all(|&j| vals[j] <= vals[i]));
                    }
                    SelectionMode::Minimize => {
                        prop_assert!(legal.iter().all(|&j| vals[j] >= vals[i]));
                    }
                    _ => {}
                }
            }
        }
    }
}

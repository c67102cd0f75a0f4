//! Guard rotation policies.
//!
//! A rotation policy decides how long a freshly picked guard stays in its
//! layer before being replaced.
//!
//! | Layer | uniform         | maxx                 |
//! |-------|-----------------|----------------------|
//! | L1    | 3 - 4 months    | 3 - 4 months         |
//! | L2    | 10 - 12 days    | max(X, X), 1 - 45 days |
//! | L3    | 10 - 14 hours   | max(X, X), 1 - 48 hours |

use crate::context::SimRng;
use crate::error::ConfigError;
use crate::layer::LayerId;
use crate::time::{SimTime, DAY, HOUR, MONTH};
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

const FIRST_LAYER_WINDOW: (SimTime, SimTime) = (3 * MONTH, 4 * MONTH);

const UNIFORM_SECOND_LAYER_WINDOW: (SimTime, SimTime) = (10 * DAY, 12 * DAY);
const UNIFORM_THIRD_LAYER_WINDOW: (SimTime, SimTime) = (10 * HOUR, 14 * HOUR);

const MAXX_SECOND_LAYER_WINDOW: (SimTime, SimTime) = (DAY, 45 * DAY);
const MAXX_THIRD_LAYER_WINDOW: (SimTime, SimTime) = (HOUR, 48 * HOUR);

/// How guard lifetimes are sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// Plain uniform draw over the layer's window
    #[default]
    Uniform,

    /// Larger of two independent uniform draws (skews toward long lifetimes).
    /// L1 keeps plain uniform sampling.
    Maxx,
}

impl RotationPolicy {
    /// Returns the policy name.
    pub fn name(&self) -> &'static str {
        match self {
            RotationPolicy::Uniform => "uniform",
            RotationPolicy::Maxx => "maxx",
        }
    }

    /// Returns the `(min, max)` lifetime window for a layer, in seconds.
    pub fn window(&self, layer: LayerId) -> (SimTime, SimTime) {
        match (self, layer) {
            (_, LayerId::L1) => FIRST_LAYER_WINDOW,
            (RotationPolicy::Uniform, LayerId::L2) => UNIFORM_SECOND_LAYER_WINDOW,
            (RotationPolicy::Uniform, LayerId::L3) => UNIFORM_THIRD_LAYER_WINDOW,
            (RotationPolicy::Maxx, LayerId::L2) => MAXX_SECOND_LAYER_WINDOW,
            (RotationPolicy::Maxx, LayerId::L3) => MAXX_THIRD_LAYER_WINDOW,
        }
    }

    /// Samples a rotation delay for a new guard in `layer`.
    pub fn sample_delay(&self, layer: LayerId, rng: &mut SimRng) -> SimTime {
        let (min, max) = self.window(layer);
        match (self, layer) {
            (RotationPolicy::Maxx, LayerId::L2 | LayerId::L3) => sample_maxx(rng, min, max),
            _ => sample_uniform(rng, min, max),
        }
    }
}

impl std::fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RotationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(RotationPolicy::Uniform),
            "maxx" => Ok(RotationPolicy::Maxx),
            _ => Err(ConfigError::UnknownRotationPolicy(s.to_string())),
        }
    }
}

/// Uniform integer draw in `[min, max]`. A degenerate window yields `min`.
pub fn sample_uniform(rng: &mut SimRng, min: SimTime, max: SimTime) -> SimTime {
    if max <= min {
        return min;
    }
    Uniform::new_inclusive(min, max).sample(rng)
}

/// Max of two independent uniform draws in `[min, max]`.
pub fn sample_maxx(rng: &mut SimRng, min: SimTime, max: SimTime) -> SimTime {
    let x1 = sample_uniform(rng, min, max);
    let x2 = sample_uniform(rng, min, max);
    x1.max(x2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_delays_stay_in_window() {
        let mut rng = SimRng::seed_from_u64(7);

        for layer in LayerId::OUTER_FIRST {
            let (min, max) = RotationPolicy::Uniform.window(layer);
            for _ in 0..500 {
                let delay = RotationPolicy::Uniform.sample_delay(layer, &mut rng);
                assert!(delay >= min && delay <= max, "{layer}: {delay}");
            }
        }
    }

    #[test]
    fn test_maxx_keeps_first_layer_uniform() {
        assert_eq!(
            RotationPolicy::Maxx.window(LayerId::L1),
            RotationPolicy::Uniform.window(LayerId::L1)
        );
        assert_eq!(RotationPolicy::Maxx.window(LayerId::L3), (HOUR, 48 * HOUR));
    }

    #[test]
    fn test_maxx_skews_toward_long_lifetimes() {
        let mut rng = SimRng::seed_from_u64(11);
        let (min, max) = (0, 1_000_000);
        let n = 4000;

        let uniform_mean: f64 =
            (0..n).map(|_| sample_uniform(&mut rng, min, max) as f64).sum::<f64>() / n as f64;
        let maxx_mean: f64 =
            (0..n).map(|_| sample_maxx(&mut rng, min, max) as f64).sum::<f64>() / n as f64;

        // E[max(X, X)] = 2/3 of the window vs 1/2 for a single draw
        assert!(maxx_mean > uniform_mean);
        assert!((maxx_mean / max as f64 - 2.0 / 3.0).abs() < 0.03);
    }

    #[test]
    fn test_maxx_delays_stay_in_real_windows() {
        let mut rng = SimRng::seed_from_u64(21);

        for (layer, min, max) in [(LayerId::L2, DAY, 45 * DAY), (LayerId::L3, HOUR, 48 * HOUR)] {
            assert_eq!(RotationPolicy::Maxx.window(layer), (min, max));

            let delays: Vec<SimTime> = (0..2000)
                .map(|_| RotationPolicy::Maxx.sample_delay(layer, &mut rng))
                .collect();
            assert!(delays.iter().all(|d| (min..=max).contains(d)), "{layer}");

            // Mean of max(X, X) sits at two thirds of the window
            let mean = delays.iter().sum::<SimTime>() as f64 / delays.len() as f64;
            let expected = min as f64 + (max - min) as f64 * 2.0 / 3.0;
            assert!((mean - expected).abs() < (max - min) as f64 * 0.05, "{layer}: {mean}");
        }
    }

    #[test]
    fn test_degenerate_window() {
        let mut rng = SimRng::seed_from_u64(3);
        assert_eq!(sample_uniform(&mut rng, 500, 500), 500);
        assert_eq!(sample_maxx(&mut rng, 500, 500), 500);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("uniform".parse::<RotationPolicy>(), Ok(RotationPolicy::Uniform));
        assert_eq!("MAXX".parse::<RotationPolicy>(), Ok(RotationPolicy::Maxx));
        assert!("gaussian".parse::<RotationPolicy>().is_err());
    }
}

//! Per-trial rest-interval offsets.
//!
//! Offsets are drawn fresh from a seedable generator; setting a seed in the
//! configuration replays the exact schedule of a previous run.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::ConfigError;

const MAX_DRAWS: usize = 1000;

/// How the offsets relate to the total session duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitterPolicy {
    /// Independent uniform draws; the schedule's total length floats.
    Unconstrained,
    /// The rest schedule sums to exactly `total_duration` seconds.
    DurationConstrained { total_duration: f64 },
}

/// Draws `n_trials` offsets in `[-bound, +bound]`; the rest interval of
/// trial `i` is `nominal_interval + offsets[i]`.
pub fn rest_offsets<R: Rng>(
    rng: &mut R,
    n_trials: usize,
    bound: f64,
    nominal_interval: f64,
    policy: JitterPolicy,
) -> Result<Vec<f64>, ConfigError> {
    match policy {
        JitterPolicy::Unconstrained => Ok((0..n_trials)
            .map(|_| rng.random_range(-bound..=bound))
            .collect()),
        JitterPolicy::DurationConstrained { total_duration } => {
            let required = n_trials as f64 * nominal_interval;
            if total_duration < required {
                return Err(ConfigError::DurationTooShort {
                    target: total_duration,
                    required,
                    trials: n_trials,
                });
            }
            let extra = total_duration - required;
            let mean = extra / n_trials as f64;
            if mean.abs() > bound {
                return Err(ConfigError::DurationOutOfReach {
                    target: total_duration,
                    needed: mean,
                    bound,
                });
            }

            // Draw, shift to the exact sum, redraw if the shift pushed any
            // offset out of bounds.
            for _ in 0..MAX_DRAWS {
                let mut offsets: Vec<f64> = (0..n_trials)
                    .map(|_| rng.random_range(-bound..=bound))
                    .collect();
                let shift = (extra - offsets.iter().sum::<f64>()) / n_trials as f64;
                for o in &mut offsets {
                    *o += shift;
                }
                if offsets.iter().all(|o| o.abs() <= bound) {
                    offsets.shuffle(rng);
                    return Ok(offsets);
                }
            }
            Err(ConfigError::JitterDrawFailed(MAX_DRAWS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn unconstrained_offsets_stay_within_bound() {
        let mut rng = StdRng::seed_from_u64(1);
        let offsets =
            rest_offsets(&mut rng, 200, 2.0, 5.0, JitterPolicy::Unconstrained).unwrap();
        assert_eq!(offsets.len(), 200);
        assert!(offsets.iter().all(|o| o.abs() <= 2.0));
    }

    #[test]
    fn constrained_offsets_sum_to_target_and_stay_bounded() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 50;
        let nominal = 45.0;
        let target = 40.0 * 60.0; // 40 minutes, mean offset 3s
        let offsets = rest_offsets(
            &mut rng,
            n,
            15.0,
            nominal,
            JitterPolicy::DurationConstrained {
                total_duration: target,
            },
        )
        .unwrap();

        let total: f64 = offsets.iter().map(|o| nominal + o).sum();
        assert!((total - target).abs() < 1e-6);
        assert!(offsets.iter().all(|o| o.abs() <= 15.0));
    }

    #[test]
    fn constrained_target_too_short_fails() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = rest_offsets(
            &mut rng,
            3,
            2.0,
            5.0,
            JitterPolicy::DurationConstrained {
                total_duration: 10.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DurationTooShort { .. }));
    }

    #[test]
    fn constrained_target_beyond_bound_fails() {
        let mut rng = StdRng::seed_from_u64(4);
        let err = rest_offsets(
            &mut rng,
            3,
            2.0,
            5.0,
            JitterPolicy::DurationConstrained {
                total_duration: 30.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DurationOutOfReach { .. }));
    }

    #[test]
    fn seeded_draws_replay_exactly() {
        let draw = || {
            let mut rng = StdRng::seed_from_u64(99);
            rest_offsets(&mut rng, 10, 2.0, 5.0, JitterPolicy::Unconstrained).unwrap()
        };
        assert_eq!(draw(), draw());
    }
}

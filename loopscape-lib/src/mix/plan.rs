//! Loop-length reconciliation.
//!
//! Every looping music bed should wrap a whole number of times over the
//! output, which means the output length wants to be a multiple of every
//! padded music length. The exact LCM is used when some multiple of it lands
//! close enough to the requested duration; otherwise a random search looks
//! for a nearby length that leaves the smallest total remainder.

use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::config::ReconcileSettings;

/// How the final length was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PlanStrategy {
    /// No music tracks; the requested length is used as-is.
    Target,
    /// A whole number of repetitions of the capped LCM.
    Lcm { lcm: u64, repetitions: u64 },
    /// Best random candidate near the target.
    Search { lcm: u64, total_remainder: u64 },
}

/// Authoritative output length shared by every track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopPlan {
    pub final_length_samples: u64,
    pub target_samples: u64,
    #[serde(flatten)]
    pub strategy: PlanStrategy,
}

impl LoopPlan {
    /// Number of one-second frames the mixer emits.
    pub fn frame_count(&self, sample_rate: u32) -> u64 {
        self.final_length_samples.div_ceil(sample_rate.max(1) as u64)
    }

    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        self.final_length_samples as f64 / sample_rate.max(1) as f64
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// LCM of `lengths`, folded only while it stays below `cap`.
///
/// Once the running LCM reaches the cap, or would overflow, the remaining
/// lengths are ignored.
pub fn capped_lcm(lengths: &[u64], cap: u64) -> u64 {
    let mut lcm = 1_u64;
    for &length in lengths.iter().filter(|&&length| length > 0) {
        if lcm >= cap {
            break;
        }
        match (lcm / gcd(lcm, length)).checked_mul(length) {
            Some(next) => lcm = next,
            None => break,
        }
    }
    lcm
}

/// Sum of `candidate mod length` over all lengths.
pub fn total_remainder(candidate: u64, lengths: &[u64]) -> u64 {
    lengths
        .iter()
        .filter(|&&length| length > 0)
        .map(|&length| candidate % length)
        .sum()
}

/// Draw `iterations` candidates uniformly from `[lower, upper]` and keep the
/// first one with the smallest total remainder.
pub fn search_length<R: Rng + ?Sized>(
    lengths: &[u64],
    lower: u64,
    upper: u64,
    iterations: usize,
    rng: &mut R,
) -> (u64, u64) {
    let upper = upper.max(lower);
    (0..iterations.max(1))
        .map(|_| rng.gen_range(lower..=upper))
        .map(|candidate| (candidate, total_remainder(candidate, lengths)))
        .min_by_key(|&(_, remainder)| remainder)
        .unwrap_or((lower, total_remainder(lower, lengths)))
}

/// Choose the final output length for a set of padded music lengths.
pub fn reconcile<R: Rng + ?Sized>(
    music_lengths: &[u64],
    target_samples: u64,
    settings: &ReconcileSettings,
    rng: &mut R,
) -> LoopPlan {
    let target = target_samples.max(1);
    if music_lengths.iter().all(|&length| length == 0) {
        info!("no music tracks, using target length of {} samples", target);
        return LoopPlan {
            final_length_samples: target,
            target_samples: target,
            strategy: PlanStrategy::Target,
        };
    }

    let cap = (target as f64 * settings.lcm_cap_factor).ceil() as u64;
    let lcm = capped_lcm(music_lengths, cap);
    let repetitions = target.div_ceil(lcm);
    let candidate = repetitions.checked_mul(lcm);
    debug!(
        "music lcm {} (cap {}), {} repetitions -> {:?}",
        lcm, cap, repetitions, candidate
    );

    let limit = 1.0 + settings.overshoot_tolerance;
    if let Some(final_length) = candidate.filter(|&len| len as f64 / target as f64 <= limit) {
        info!(
            "final length {} samples ({} x lcm {})",
            final_length, repetitions, lcm
        );
        return LoopPlan {
            final_length_samples: final_length,
            target_samples: target,
            strategy: PlanStrategy::Lcm { lcm, repetitions },
        };
    }

    let lower = ((target as f64 * (1.0 - settings.overshoot_tolerance)) as u64).max(1);
    let upper = (target as f64 * limit) as u64;
    let (final_length, remainder) =
        search_length(music_lengths, lower, upper, settings.search_iterations, rng);
    info!(
        "lcm {} overshoots target {}, searched [{}, {}] -> {} samples (remainder {})",
        lcm, target, lower, upper, final_length, remainder
    );

    LoopPlan {
        final_length_samples: final_length,
        target_samples: target,
        strategy: PlanStrategy::Search {
            lcm,
            total_remainder: remainder,
        },
    }
}

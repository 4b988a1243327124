//! Smooth gap filling between two known sample runs.
//!
//! The bridge is a least-squares quartic trend fitted through the known
//! samples on both sides of the gap, plus decaying corrections that pin the
//! value and slope of the bridge to the neighbouring samples. The result is
//! continuous in value and first derivative at both joins while staying
//! bounded over long gaps.

const FIT_DEGREE: usize = 4;
/// Value corrections decay over this fraction of the gap.
const VALUE_DECAY_DIVISOR: f64 = 8.0;
/// Upper bound, in samples, on how long a slope correction persists.
const SLOPE_DECAY_SAMPLES: f64 = 16.0;

/// Synthesize `missing` samples that join `left` (ending just before the gap)
/// to `right` (starting just after it).
pub fn bridge(left: &[f32], missing: usize, right: &[f32]) -> Vec<f32> {
    if missing == 0 {
        return Vec::new();
    }
    if left.is_empty() && right.is_empty() {
        return vec![0.0; missing];
    }

    let n1 = left.len();
    let span = n1 + missing + right.len();
    let axis = Axis::new(span);

    let points = left
        .iter()
        .enumerate()
        .map(|(i, &y)| (i, y as f64))
        .chain(
            right
                .iter()
                .enumerate()
                .map(|(i, &y)| (n1 + missing + i, y as f64)),
        );
    let trend = Polynomial::fit(points.map(|(x, y)| (axis.to_unit(x as f64), y)), span - missing);

    let value_tau = (missing as f64 / VALUE_DECAY_DIVISOR).max(1.0);
    let slope_tau = value_tau.min(SLOPE_DECAY_SAMPLES);

    let left_anchor = anchor(left.last().copied(), edge_slope(left, Edge::End))
        .map(|(value, slope)| {
            let x = (n1 - 1) as f64;
            Correction::new(
                value - trend.eval(axis.to_unit(x)),
                slope - trend.slope(axis.to_unit(x)) * axis.scale,
                value_tau,
                slope_tau,
                x,
                Direction::Forward,
            )
        });
    let right_anchor = anchor(right.first().copied(), edge_slope(right, Edge::Start))
        .map(|(value, slope)| {
            let x = (n1 + missing) as f64;
            Correction::new(
                value - trend.eval(axis.to_unit(x)),
                slope - trend.slope(axis.to_unit(x)) * axis.scale,
                value_tau,
                slope_tau,
                x,
                Direction::Backward,
            )
        });

    (0..missing)
        .map(|i| {
            let x = (n1 + i) as f64;
            let mut value = trend.eval(axis.to_unit(x));
            if let Some(correction) = &left_anchor {
                value += correction.at(x);
            }
            if let Some(correction) = &right_anchor {
                value += correction.at(x);
            }
            value as f32
        })
        .collect()
}

fn anchor(value: Option<f32>, slope: Option<f64>) -> Option<(f64, f64)> {
    value.map(|v| (v as f64, slope.unwrap_or(0.0)))
}

enum Edge {
    Start,
    End,
}

/// One-sided finite-difference slope at an edge of a run, in samples.
fn edge_slope(samples: &[f32], edge: Edge) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let slope = match edge {
        Edge::Start => samples[1] as f64 - samples[0] as f64,
        Edge::End => samples[samples.len() - 1] as f64 - samples[samples.len() - 2] as f64,
    };
    Some(slope)
}

/// Maps sample positions onto [-1, 1] to keep the fit well conditioned.
struct Axis {
    offset: f64,
    /// d(unit)/d(sample)
    scale: f64,
}

impl Axis {
    fn new(span: usize) -> Self {
        let half = ((span.max(2) - 1) as f64) / 2.0;
        Self {
            offset: half,
            scale: 1.0 / half,
        }
    }

    fn to_unit(&self, x: f64) -> f64 {
        (x - self.offset) * self.scale
    }
}

/// Coefficients in ascending powers.
struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Least-squares fit of degree `min(FIT_DEGREE, count - 1)`.
    fn fit(points: impl Iterator<Item = (f64, f64)>, count: usize) -> Self {
        let max_degree = FIT_DEGREE.min(count.saturating_sub(1));
        let terms = max_degree + 1;

        // Accumulate power sums once, then solve for decreasing degrees
        // until the normal equations are well posed.
        let mut power_sums = vec![0.0_f64; 2 * terms - 1];
        let mut moments = vec![0.0_f64; terms];
        for (u, y) in points {
            let mut p = 1.0;
            for (k, sum) in power_sums.iter_mut().enumerate() {
                *sum += p;
                if k < terms {
                    moments[k] += p * y;
                }
                p *= u;
            }
        }

        for degree in (0..=max_degree).rev() {
            let n = degree + 1;
            let mut matrix = vec![vec![0.0_f64; n + 1]; n];
            for (row, line) in matrix.iter_mut().enumerate() {
                for col in 0..n {
                    line[col] = power_sums[row + col];
                }
                line[n] = moments[row];
            }
            if let Some(coefficients) = solve(matrix) {
                return Self { coefficients };
            }
        }

        Self {
            coefficients: vec![0.0],
        }
    }

    fn eval(&self, u: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * u + c)
    }

    /// Derivative with respect to the unit axis.
    fn slope(&self, u: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, &c)| acc * u + k as f64 * c)
    }
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve(mut matrix: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = matrix.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| {
            matrix[a][col]
                .abs()
                .partial_cmp(&matrix[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if matrix[pivot][col].abs() < 1e-12 {
            return None;
        }
        matrix.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..=n {
                matrix[row][k] -= factor * matrix[col][k];
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (matrix[row][n] - tail) / matrix[row][row];
    }
    if solution.iter().all(|c| c.is_finite()) {
        Some(solution)
    } else {
        None
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Decaying offset that matches an anchor's value and slope at its origin.
///
/// For distance `k` from the origin the offset is
/// `value * e^(-k/value_tau) + (slope + value/value_tau) * k * e^(-k/slope_tau)`,
/// whose derivative at `k = 0` equals `slope`.
struct Correction {
    value: f64,
    slope_term: f64,
    value_tau: f64,
    slope_tau: f64,
    origin: f64,
    direction: Direction,
}

impl Correction {
    fn new(
        value: f64,
        slope: f64,
        value_tau: f64,
        slope_tau: f64,
        origin: f64,
        direction: Direction,
    ) -> Self {
        // Walking backward flips the sign of the slope seen along `k`.
        let slope_along = match direction {
            Direction::Forward => slope,
            Direction::Backward => -slope,
        };
        Self {
            value,
            slope_term: slope_along + value / value_tau,
            value_tau,
            slope_tau,
            origin,
            direction,
        }
    }

    fn at(&self, x: f64) -> f64 {
        let k = match self.direction {
            Direction::Forward => x - self.origin,
            Direction::Backward => self.origin - x,
        };
        self.value * (-k / self.value_tau).exp()
            + self.slope_term * k * (-k / self.slope_tau).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f64, sr: f64, phase: f64) -> Vec<f32> {
        (0..len)
            .map(|i| (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / sr + phase).sin()) as f32)
            .collect()
    }

    #[test]
    fn bridge_has_requested_length() {
        let left = sine(200, 220.0, 44100.0, 0.0);
        let right = sine(300, 220.0, 44100.0, 1.0);
        assert_eq!(bridge(&left, 1234, &right).len(), 1234);
        assert!(bridge(&left, 0, &right).is_empty());
    }

    #[test]
    fn linear_ramp_is_continued_exactly() {
        let left: Vec<f32> = (0..50).map(|i| i as f32 * 0.01).collect();
        let right: Vec<f32> = (60..110).map(|i| i as f32 * 0.01).collect();
        let gap = bridge(&left, 10, &right);
        for (i, value) in gap.iter().enumerate() {
            let expected = (50 + i) as f32 * 0.01;
            assert!((value - expected).abs() < 1e-3, "index {}: {}", i, value);
        }
    }

    #[test]
    fn joins_are_value_and_slope_continuous() {
        let left = sine(2000, 330.0, 44100.0, 0.3);
        let right = sine(1500, 330.0, 44100.0, 2.1);
        let gap = bridge(&left, 5000, &right);

        let left_last = *left.last().unwrap();
        let left_slope = left_last - left[left.len() - 2];
        let predicted = left_last + left_slope;
        assert!((gap[0] - predicted).abs() < 0.01, "{} vs {}", gap[0], predicted);

        let right_slope = right[1] - right[0];
        let predicted = right[0] - right_slope;
        let last = *gap.last().unwrap();
        assert!((last - predicted).abs() < 0.01, "{} vs {}", last, predicted);
    }

    #[test]
    fn long_gap_stays_bounded() {
        let left = sine(4000, 440.0, 44100.0, 0.0);
        let right = sine(4000, 440.0, 44100.0, 0.7);
        let gap = bridge(&left, 40_000, &right);
        assert!(gap.iter().all(|v| v.is_finite() && v.abs() < 1.0));
    }

    #[test]
    fn one_sided_and_empty_inputs() {
        let left = vec![0.2_f32; 10];
        let gap = bridge(&left, 8, &[]);
        assert_eq!(gap.len(), 8);
        assert!((gap[0] - 0.2).abs() < 1e-3);

        assert_eq!(bridge(&[], 4, &[]), vec![0.0; 4]);

        let gap = bridge(&[0.5], 3, &[0.5]);
        assert!(gap.iter().all(|v| (v - 0.5).abs() < 1e-3));
    }
}

use crate::error::BivError;

use nalgebra::DMatrix;

/// Minimum number of present samples for a periodic fit.
pub const MIN_SAMPLES: usize = 2;

/// Maps any finite time onto one period `[0, 1)`.
pub fn wrap_time(t: f64) -> Result<f64, BivError> {
    if !t.is_finite() {
        return Err(BivError::TimeOutOfRange { t });
    }
    let wrapped = t.rem_euclid(1.0);
    // rem_euclid rounds tiny negative inputs up to exactly 1.0
    Ok(if wrapped >= 1.0 { 0.0 } else { wrapped })
}

/// Periodic cubic interpolating spline over `[0, 1)` for many value channels.
///
/// All channels share the same knots, so the cyclic tridiagonal system is
/// factorised once and solved for every channel together. Value and first and
/// second derivatives match across the wrap from `t -> 1` to `t = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicSpline {
    knots: Vec<f64>,
    /// One row per knot, one column per channel.
    values: DMatrix<f64>,
    /// Second derivatives at the knots, same layout as `values`.
    moments: DMatrix<f64>,
}

impl PeriodicSpline {
    /// Fits the spline through masked samples.
    ///
    /// `times[i]` is the position of sample `i` in the cycle; `None` samples are
    /// left out of the fit. Present samples must all have the same number of
    /// channels and distinct times.
    pub fn fit(times: &[f64], samples: &[Option<Vec<f64>>]) -> Result<Self, BivError> {
        assert_eq!(times.len(), samples.len(), "one time per sample");

        let mut present: Vec<(f64, &[f64])> = Vec::with_capacity(samples.len());
        for (&t, sample) in times.iter().zip(samples) {
            if let Some(values) = sample {
                present.push((wrap_time(t)?, values.as_slice()));
            }
        }

        let n = present.len();
        if n < MIN_SAMPLES {
            return Err(BivError::InsufficientFrameData {
                available: n,
                required: MIN_SAMPLES,
            });
        }
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let channels = present[0].1.len();
        if let Some((_, bad)) = present.iter().find(|(_, v)| v.len() != channels) {
            return Err(BivError::InvalidControlPointCount {
                expected: channels,
                found: bad.len(),
            });
        }

        let knots: Vec<f64> = present.iter().map(|(t, _)| *t).collect();
        let values = DMatrix::from_fn(n, channels, |r, c| present[r].1[c]);

        let spans: Vec<f64> = (0..n).map(|i| span(&knots, i)).collect();
        if spans.iter().any(|h| *h <= 0.0) {
            return Err(BivError::SingularSystem);
        }

        // h[i-1] M[i-1] + 2 (h[i-1] + h[i]) M[i] + h[i] M[i+1]
        //   = 6 ((y[i+1] - y[i]) / h[i] - (y[i] - y[i-1]) / h[i-1]), indices cyclic
        let mut system = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DMatrix::<f64>::zeros(n, channels);
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let (h_prev, h) = (spans[prev], spans[i]);

            system[(i, prev)] += h_prev;
            system[(i, i)] += 2.0 * (h_prev + h);
            system[(i, next)] += h;

            for c in 0..channels {
                rhs[(i, c)] = 6.0
                    * ((values[(next, c)] - values[(i, c)]) / h
                        - (values[(i, c)] - values[(prev, c)]) / h_prev);
            }
        }

        let moments = system.lu().solve(&rhs).ok_or(BivError::SingularSystem)?;

        log::debug!(
            "fitted periodic spline: {} knots, {} channels",
            n,
            channels
        );

        Ok(PeriodicSpline {
            knots,
            values,
            moments,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn n_channels(&self) -> usize {
        self.values.ncols()
    }

    /// Values of every channel at time `t`, wrapped onto one period.
    pub fn evaluate(&self, t: f64) -> Result<Vec<f64>, BivError> {
        let t = wrap_time(t)?;
        let n = self.knots.len();

        // before the first knot lies on the segment wrapping from the last one
        let (i, t) = if t < self.knots[0] {
            (n - 1, t + 1.0)
        } else {
            (self.knots.partition_point(|k| *k <= t) - 1, t)
        };
        let next = (i + 1) % n;
        let h = span(&self.knots, i);

        let a = self.knots[i] + h - t;
        let b = t - self.knots[i];

        Ok((0..self.n_channels())
            .map(|c| {
                let (y0, y1) = (self.values[(i, c)], self.values[(next, c)]);
                let (m0, m1) = (self.moments[(i, c)], self.moments[(next, c)]);
                (m0 * a.powi(3) + m1 * b.powi(3)) / (6.0 * h)
                    + (y0 / h - m0 * h / 6.0) * a
                    + (y1 / h - m1 * h / 6.0) * b
            })
            .collect())
    }
}

/// Length of the segment starting at knot `i`; the last one wraps to the first knot.
fn span(knots: &[f64], i: usize) -> f64 {
    if i + 1 < knots.len() {
        knots[i + 1] - knots[i]
    } else {
        knots[0] + 1.0 - knots[i]
    }
}

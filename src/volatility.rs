//! Rolling-window standard deviation of the mid price, O(1) per update.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 30;

/// Fixed-capacity ring buffer of N mid samples plus running sum and
/// sum-of-squares. Before the buffer fills, the departing sample is treated
/// as 0 rather than reusing the oldest real value again.
pub struct VolatilityEstimator {
    window: usize,
    buffer: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl VolatilityEstimator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buffer: VecDeque::with_capacity(window),
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
        }
    }

    /// Pushes `x_new`, evicting the oldest sample once the window is full,
    /// and returns the updated population stdev.
    pub fn update(&mut self, x_new: f64) -> f64 {
        let x_old = if self.count < self.window {
            self.count += 1;
            0.0
        } else {
            self.buffer.pop_front().unwrap_or(0.0)
        };
        self.buffer.push_back(x_new);

        self.sum += x_new - x_old;
        self.sum_sq += x_new * x_new - x_old * x_old;

        let n = self.count as f64;
        let mean = self.sum / n;
        let mut var = self.sum_sq / n - mean * mean;
        if !var.is_finite() || var < 0.0 {
            var = 0.0;
        }
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_volatility() {
        let mut est = VolatilityEstimator::new(5);
        let mut last = 0.0;
        for _ in 0..10 {
            last = est.update(100.0);
        }
        assert!((last).abs() < 1e-9);
    }

    #[test]
    fn partial_window_treats_missing_as_zero() {
        // Only one non-zero sample so far; mean = x/count, matches a
        // straightforward manual computation over [x].
        let mut est = VolatilityEstimator::new(30);
        let stdev = est.update(100.0);
        assert!((stdev - 0.0).abs() < 1e-9);

        let stdev2 = est.update(102.0);
        // count=2, values effectively [100, 102], mean=101, var=1, stdev=1
        assert!((stdev2 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn never_returns_non_finite() {
        let mut est = VolatilityEstimator::new(3);
        for x in [1.0, 1.0, 1.0, 1.0, 1.0] {
            let v = est.update(x);
            assert!(v.is_finite());
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn window_eviction_matches_manual_stdev() {
        let mut est = VolatilityEstimator::new(3);
        est.update(1.0);
        est.update(2.0);
        est.update(3.0);
        // buffer now [1,2,3] full; next push evicts 1.
        let stdev = est.update(4.0);
        // values [2,3,4], mean=3, var=((1+0+1)/3)=2/3
        let expected = (2.0_f64 / 3.0).sqrt();
        assert!((stdev - expected).abs() < 1e-9);
    }
}

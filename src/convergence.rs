//! Damped updates of the radiation field and the convergence test between iterations.

use crate::config::ConvergenceStrategy;
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

/// `old + damping (estimate - old)`
pub fn damped_update(old: f64, estimate: f64, damping: f64) -> f64 {
    old + damping * (estimate - old)
}

/// Relative change `|estimate - old| / old`.
pub fn relative_change(old: f64, estimate: f64) -> f64 {
    (estimate - old).abs() / old
}

/// Fraction of shells whose estimate lies within `threshold` of the current value.
pub fn converged_fraction(old: &Array1<f64>, estimate: &Array1<f64>, threshold: f64) -> f64 {
    if old.is_empty() {
        return 1.0;
    }
    let converged = Zip::from(old)
        .and(estimate)
        .fold(0usize, |acc, o, e| {
            acc + usize::from(relative_change(*o, *e) < threshold)
        });
    converged as f64 / old.len() as f64
}

/// Outcome of one convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub t_rad_fraction: f64,
    pub w_fraction: f64,
    pub t_inner_change: f64,
    /// All quantities converged in this iteration
    pub iteration_converged: bool,
    /// Converged for more than `hold_iterations` consecutive iterations
    pub converged: bool,
}

/// Tracks consecutive converged iterations.
#[derive(Debug, Clone)]
pub struct ConvergenceSolver {
    strategy: ConvergenceStrategy,
    consecutive_converged: usize,
}

impl ConvergenceSolver {
    pub fn new(strategy: ConvergenceStrategy) -> Self {
        Self {
            strategy,
            consecutive_converged: 0,
        }
    }

    pub fn strategy(&self) -> &ConvergenceStrategy {
        &self.strategy
    }

    pub fn consecutive_converged(&self) -> usize {
        self.consecutive_converged
    }

    /// Compares the estimates with the values used in the last iteration.
    pub fn check(
        &mut self,
        t_rad: &Array1<f64>,
        t_rad_estimate: &Array1<f64>,
        w: &Array1<f64>,
        w_estimate: &Array1<f64>,
        t_inner: f64,
        t_inner_estimate: f64,
    ) -> ConvergenceReport {
        let strategy = &self.strategy;
        let t_rad_fraction =
            converged_fraction(t_rad, t_rad_estimate, strategy.threshold(&strategy.t_rad));
        let w_fraction = converged_fraction(w, w_estimate, strategy.threshold(&strategy.w));
        let t_inner_change = relative_change(t_inner, t_inner_estimate);

        let iteration_converged = t_rad_fraction >= strategy.fraction
            && w_fraction >= strategy.fraction
            && t_inner_change < strategy.threshold(&strategy.t_inner);
        if iteration_converged {
            self.consecutive_converged += 1;
        } else {
            self.consecutive_converged = 0;
        }

        ConvergenceReport {
            t_rad_fraction,
            w_fraction,
            t_inner_change,
            iteration_converged,
            converged: self.consecutive_converged > strategy.hold_iterations,
        }
    }

    /// Damped radiation temperature, shells without an estimate keep their value.
    pub fn damp_t_rad(&self, old: &Array1<f64>, estimate: &Array1<f64>) -> Array1<f64> {
        damp_shells(old, estimate, self.strategy.damping(&self.strategy.t_rad))
    }

    pub fn damp_w(&self, old: &Array1<f64>, estimate: &Array1<f64>) -> Array1<f64> {
        damp_shells(old, estimate, self.strategy.damping(&self.strategy.w))
    }

    pub fn damp_t_inner(&self, old: f64, estimate: f64) -> f64 {
        damped_update(old, estimate, self.strategy.damping(&self.strategy.t_inner))
    }
}

fn damp_shells(old: &Array1<f64>, estimate: &Array1<f64>, damping: f64) -> Array1<f64> {
    Zip::from(old).and(estimate).map_collect(|o, e| {
        if e.is_finite() && *e > 0.0 {
            damped_update(*o, *e, damping)
        } else {
            *o
        }
    })
}

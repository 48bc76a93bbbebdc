//! Bounded derivative-free minimisation
//!
//! Model likelihoods are minimised with argmin's Nelder-Mead solver. The
//! solver itself is unconstrained, so every candidate point is clamped into
//! its box before the objective sees it, and non-finite objective values are
//! replaced by a large penalty that pushes the simplex away.

use crate::{MathError, Result};
use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;

const PENALTY_COST: f64 = 1e30;

/// Solver settings for [`minimize_bounded`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    pub max_iters: u64,
    /// Stop once the simplex cost standard deviation falls below this
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex around the starting point
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iters: 500,
            sd_tolerance: 1e-10,
            initial_step: 0.1,
        }
    }
}

/// Best point found by the solver
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
}

struct BoundedCost<'a, F> {
    objective: F,
    bounds: &'a [(f64, f64)],
}

impl<F> CostFunction for BoundedCost<'_, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let clamped = clamp_to_bounds(param, self.bounds);
        let value = (self.objective)(&clamped);
        Ok(if value.is_finite() { value } else { PENALTY_COST })
    }
}

/// Clamp each coordinate into its `(lower, upper)` bound
pub fn clamp_to_bounds(point: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    point
        .iter()
        .zip(bounds.iter())
        .map(|(&x, &(lower, upper))| x.max(lower).min(upper))
        .collect()
}

/// Minimise `objective` inside the box given by `bounds`
pub fn minimize_bounded<F>(
    objective: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    config: NelderMeadConfig,
) -> Result<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    if initial.is_empty() {
        return Err(MathError::InvalidInput(
            "Optimisation needs at least one parameter".to_string(),
        ));
    }
    if bounds.len() != initial.len() {
        return Err(MathError::InvalidInput(format!(
            "Expected {} bounds, got {}",
            initial.len(),
            bounds.len()
        )));
    }
    if bounds.iter().any(|&(lower, upper)| !(lower <= upper)) {
        return Err(MathError::InvalidInput(
            "Lower bound exceeds upper bound".to_string(),
        ));
    }

    let start = clamp_to_bounds(initial, bounds);
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.clone());
    for (i, &(_, upper)) in bounds.iter().enumerate() {
        let mut vertex = start.clone();
        let step = config.initial_step * start[i].abs().max(1.0);
        vertex[i] = if vertex[i] + step <= upper {
            vertex[i] + step
        } else {
            vertex[i] - step
        };
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(config.sd_tolerance)
        .map_err(|e| MathError::CalculationError(e.to_string()))?;
    let problem = BoundedCost { objective, bounds };

    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(config.max_iters))
        .run()
        .map_err(|e| MathError::CalculationError(e.to_string()))?;

    let state = result.state();
    let best = state.get_best_param().ok_or_else(|| {
        MathError::CalculationError("Optimiser finished without a best point".to_string())
    })?;
    let cost = state.get_best_cost();
    if !cost.is_finite() || cost >= PENALTY_COST {
        return Err(MathError::CalculationError(
            "Objective was not finite anywhere the optimiser looked".to_string(),
        ));
    }

    Ok(Minimum {
        point: clamp_to_bounds(best, bounds),
        cost,
        iterations: state.get_iter(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_interior_minimum() {
        let objective = |p: &[f64]| (p[0] - 1.5).powi(2) + (p[1] + 0.5).powi(2);
        let min = minimize_bounded(
            objective,
            &[0.0, 0.0],
            &[(-5.0, 5.0), (-5.0, 5.0)],
            NelderMeadConfig::default(),
        )
        .unwrap();

        assert!((min.point[0] - 1.5).abs() < 1e-3);
        assert!((min.point[1] + 0.5).abs() < 1e-3);
        assert!(min.cost < 1e-6);
    }

    #[test]
    fn respects_bounds() {
        let objective = |p: &[f64]| (p[0] - 3.0).powi(2);
        let min =
            minimize_bounded(objective, &[0.0], &[(-0.99, 0.99)], NelderMeadConfig::default())
                .unwrap();

        assert!(min.point[0] <= 0.99);
        assert!((min.point[0] - 0.99).abs() < 1e-3);
    }

    #[test]
    fn rejects_mismatched_bounds() {
        let objective = |p: &[f64]| p[0];
        assert!(minimize_bounded(objective, &[0.0, 1.0], &[(0.0, 1.0)], NelderMeadConfig::default()).is_err());
        assert!(minimize_bounded(objective, &[], &[], NelderMeadConfig::default()).is_err());
    }

    #[test]
    fn nowhere_finite_objective_fails() {
        let objective = |_: &[f64]| f64::NAN;
        assert!(minimize_bounded(objective, &[0.5], &[(0.0, 1.0)], NelderMeadConfig::default()).is_err());
    }
}

//! Application of the global solution vector to the solver state.

use crate::composition_set::CompositionSet;
use crate::conditions::EquilibriumConditions;
use ndarray::{Array1, ArrayViewMut1};

/// Change magnitudes tracked while applying a global solution.
///
/// `largest_statevar_change` folds the relative changes of the chemical
/// potentials and of the state variables into one gauge; the phase-amount
/// change is tracked as the largest absolute increment before clipping.
pub(crate) struct AppliedSolution {
    pub largest_statevar_change: f64,
    pub largest_phase_amt_change: f64,
}

/// Unpack the global solution in column order: chemical potentials (absolute
/// values), phase-amount increments (clipped to `[0, 1]`), state-variable
/// increments (applied to the state-variable prefix of every phase).
pub(crate) fn apply_solution(
    soln: &Array1<f64>,
    compsets: &mut [CompositionSet],
    conditions: &EquilibriumConditions,
    free_stable: &[usize],
    chemical_potentials: &mut Array1<f64>,
    mut phase_amt: ArrayViewMut1<f64>,
    delta_statevars: &mut Array1<f64>,
) -> AppliedSolution {
    let mut largest_statevar_change: f64 = 0.0;
    let mut largest_phase_amt_change: f64 = 0.0;

    for (col, &chempot_idx) in conditions
        .free_chemical_potential_indices
        .iter()
        .enumerate()
    {
        let old = chemical_potentials[chempot_idx];
        let new = soln[col];
        chemical_potentials[chempot_idx] = new;
        largest_statevar_change = largest_statevar_change.max(((new - old) / old).abs());
    }

    let mut offset = conditions.free_chemical_potential_indices.len();
    for (col, &idx) in free_stable.iter().enumerate() {
        let increment = soln[offset + col];
        phase_amt[idx] = f64::max(0.0, f64::min(1.0, phase_amt[idx] + increment));
        largest_phase_amt_change = largest_phase_amt_change.max(increment.abs());
    }
    offset += free_stable.len();

    delta_statevars.fill(0.0);
    for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
        delta_statevars[sv] = soln[offset + col];
    }
    for sv in 0..conditions.num_statevars {
        let relative_change = (delta_statevars[sv] / compsets[0].dof[sv]).abs();
        if !relative_change.is_nan() {
            largest_statevar_change = largest_statevar_change.max(relative_change);
        }
    }
    for compset in compsets.iter_mut() {
        for sv in 0..conditions.num_statevars {
            compset.dof[sv] += delta_statevars[sv];
        }
    }

    AppliedSolution {
        largest_statevar_change,
        largest_phase_amt_change,
    }
}

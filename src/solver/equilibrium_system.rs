//! Assembly of the global equilibrium system.
//!
//! The unknowns are, in this order: the free chemical potentials (absolute
//! values), the amount increments of the stable phases, and the increments of
//! the free state variables. The rows express, in this order: the linearized
//! equality of phase energy and chemical-potential-weighted phase mass for
//! every stable phase, the mass-balance correction for every prescribed
//! element, and the total-system-amount balance.

use super::phase_system::{compute_phase_matrix, condense_phase_response, PhaseWorkspace};
use crate::composition_set::CompositionSet;
use crate::conditions::EquilibriumConditions;
use crate::errors::CalphadResult;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// The assembled global system together with the scalar mass residual used by
/// the convergence gate.
pub(crate) struct EquilibriumSystem {
    pub matrix: Array2<f64>,
    pub rhs: Array1<f64>,
    pub mass_residual: f64,
}

impl EquilibriumSystem {
    /// Condense every stable phase and fill the global matrix and right-hand
    /// side.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        compsets: &[CompositionSet],
        workspaces: &mut [PhaseWorkspace],
        conditions: &EquilibriumConditions,
        free_stable: &[usize],
        phase_amt: ArrayView1<f64>,
        chemical_potentials: &Array1<f64>,
        phase_energies: ArrayView1<f64>,
        phase_masses: ArrayView2<f64>,
        current_elemental_amounts: ArrayView1<f64>,
    ) -> CalphadResult<Self> {
        let num_statevars = conditions.num_statevars;
        let num_free_chempots = conditions.free_chemical_potential_indices.len();
        let num_stable_phases = free_stable.len();
        let num_fixed_elements = conditions.prescribed_element_indices.len();
        let num_rows = num_stable_phases + num_fixed_elements + 1;
        let num_cols =
            num_free_chempots + num_stable_phases + conditions.free_statevar_indices.len();

        let mut matrix = Array2::zeros((num_rows, num_cols));
        let mut rhs = Array1::zeros(num_rows);
        let system_row = num_stable_phases + num_fixed_elements;
        let statevar_offset = num_free_chempots + num_stable_phases;

        let mut current_system_amount = 0.0;
        for (stable_idx, &idx) in free_stable.iter().enumerate() {
            let compset = &compsets[idx];
            let ws = &mut workspaces[idx];
            compute_phase_matrix(ws, compset, num_statevars)?;
            condense_phase_response(ws, compset, num_statevars)?;

            let masses = phase_masses.row(idx);
            let amount = phase_amt[idx];

            // linearized equality of phase energy and weighted phase mass
            for (col, &chempot_idx) in conditions
                .free_chemical_potential_indices
                .iter()
                .enumerate()
            {
                matrix[(stable_idx, col)] = masses[chempot_idx];
            }
            for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
                matrix[(stable_idx, statevar_offset + col)] = -ws.grad[sv];
            }
            rhs[stable_idx] = phase_energies[idx];
            for &chempot_idx in &conditions.fixed_chemical_potential_indices {
                rhs[stable_idx] -= masses[chempot_idx] * chemical_potentials[chempot_idx];
            }

            // mass-balance rows of the prescribed elements
            for (fixed_component, &element) in
                conditions.prescribed_element_indices.iter().enumerate()
            {
                Self::fill_mass_balance_row(
                    &mut matrix,
                    &mut rhs,
                    ws,
                    conditions,
                    num_stable_phases + fixed_component,
                    stable_idx,
                    amount,
                    masses[element],
                    Some(element),
                    chemical_potentials,
                );
            }

            // total-system-amount row sums the balances of all components
            Self::fill_mass_balance_row(
                &mut matrix,
                &mut rhs,
                ws,
                conditions,
                system_row,
                stable_idx,
                amount,
                masses.sum(),
                None,
                chemical_potentials,
            );
            current_system_amount += amount * masses.sum();
        }

        // shift the right-hand sides by the current imbalances
        let mut mass_residual = 0.0;
        for (fixed_component, &element) in conditions.prescribed_element_indices.iter().enumerate()
        {
            let imbalance = current_elemental_amounts[element]
                - conditions.prescribed_elemental_amounts[fixed_component];
            rhs[num_stable_phases + fixed_component] -= imbalance;
            mass_residual +=
                (imbalance / conditions.prescribed_elemental_amounts[fixed_component]).abs();
        }
        let system_imbalance = current_system_amount - conditions.prescribed_system_amount;
        rhs[system_row] -= system_imbalance;
        mass_residual += system_imbalance.abs();

        Ok(Self {
            matrix,
            rhs,
            mass_residual,
        })
    }

    /// Contributions of one condensed stable phase to one mass-balance row.
    /// The balanced quantity is the amount of a single element, or the total
    /// system amount when `element` is `None`.
    #[allow(clippy::too_many_arguments)]
    fn fill_mass_balance_row(
        matrix: &mut Array2<f64>,
        rhs: &mut Array1<f64>,
        ws: &PhaseWorkspace,
        conditions: &EquilibriumConditions,
        row: usize,
        stable_idx: usize,
        amount: f64,
        mass: f64,
        element: Option<usize>,
        chemical_potentials: &Array1<f64>,
    ) {
        let num_statevars = conditions.num_statevars;
        let num_free_chempots = conditions.free_chemical_potential_indices.len();
        let statevar_offset = matrix.ncols() - conditions.free_statevar_indices.len();
        let phase_dof = ws.e_matrix.nrows();
        let mass_jac = |j: usize| match element {
            Some(c) => ws.mass_jac[(c, num_statevars + j)],
            None => (0..ws.mass_jac.nrows())
                .map(|c| ws.mass_jac[(c, num_statevars + j)])
                .sum(),
        };

        for (col, &chempot_idx) in conditions
            .free_chemical_potential_indices
            .iter()
            .enumerate()
        {
            let mut coefficient = 0.0;
            for j in 0..phase_dof {
                coefficient += mass_jac(j) * ws.c_component[(chempot_idx, j)];
            }
            matrix[(row, col)] += amount * coefficient;
        }
        matrix[(row, num_free_chempots + stable_idx)] += mass;
        for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
            let mut coefficient = 0.0;
            for j in 0..phase_dof {
                coefficient += mass_jac(j) * ws.c_statevars[(j, sv)];
            }
            matrix[(row, statevar_offset + col)] += amount * coefficient;
        }

        let mut gradient_shift = 0.0;
        for j in 0..phase_dof {
            gradient_shift += mass_jac(j) * ws.c_g[j];
        }
        rhs[row] -= amount * gradient_shift;
        for &chempot_idx in &conditions.fixed_chemical_potential_indices {
            let mut coefficient = 0.0;
            for j in 0..phase_dof {
                coefficient += mass_jac(j) * ws.c_component[(chempot_idx, j)];
            }
            rhs[row] -= amount * chemical_potentials[chempot_idx] * coefficient;
        }
    }
}

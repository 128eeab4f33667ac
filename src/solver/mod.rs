//! The outer equilibrium iteration.
//!
//! Every iteration performs two Newton-type steps after Sundman et al.
//! (Comput. Mater. Sci. 101 (2015) 127-137): first the internal degrees of
//! freedom of every phase (stable or not) are corrected against the phase's
//! own constrained stationarity conditions, then a global linear system is
//! solved for the free chemical potentials, the amount increments of the
//! stable phases and the increments of the free state variables. Phases are
//! admitted to and removed from the stable set between iterations, driven by
//! driving forces and amount thresholds.

mod convergence;
mod equilibrium_system;
mod lstsq;
mod phase_system;
mod solution;

use crate::composition_set::CompositionSet;
use crate::conditions::EquilibriumConditions;
use crate::errors::{CalphadError, CalphadResult};
use crate::MIN_SITE_FRACTION;
use equilibrium_system::EquilibriumSystem;
use ndarray::{Array1, Array2};
use phase_system::PhaseWorkspace;

const MAX_ITER_EQUILIBRIUM: usize = 100;

/// Level of detail of the iteration output.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Verbosity {
    /// Do not print output.
    None,
    /// Print a summary of the success or failure of the iteration.
    Result,
    /// Print a detailed progress of the iteration.
    Iter,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::None
    }
}

/// Options of the equilibrium iteration.
#[derive(Copy, Clone, Default)]
pub struct SolverOptions {
    /// Cap on the number of outer iterations.
    pub max_iter: Option<usize>,
    /// Verbosity of the iteration output.
    pub verbosity: Verbosity,
}

impl SolverOptions {
    fn unwrap_or(self, max_iter: usize) -> (usize, Verbosity) {
        (self.max_iter.unwrap_or(max_iter), self.verbosity)
    }
}

/// The state returned by an equilibrium calculation.
///
/// Non-convergence within the iteration cap is a data signal, not an error:
/// the last iterate is returned with `converged` unset and the caller decides
/// whether to accept it.
pub struct EquilibriumResult {
    /// Whether the convergence criteria were met within the iteration cap.
    pub converged: bool,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// State variables of the first phase, the internal degrees of freedom of
    /// every phase, and all phase amounts, concatenated.
    pub x: Array1<f64>,
    /// Chemical potentials of all components.
    pub chemical_potentials: Array1<f64>,
}

/// Find the phase amounts, internal degrees of freedom, chemical potentials
/// and state variables that satisfy the imposed conditions.
///
/// The composition sets provide the starting point and are mutated in place;
/// on return they carry the final state. The set of stable phases is seeded
/// from the initial phase amounts; phases of zero amount participate as
/// metastable phases and can be admitted later by their driving force.
pub fn find_solution(
    compsets: &mut [CompositionSet],
    conditions: &EquilibriumConditions,
    options: SolverOptions,
) -> CalphadResult<EquilibriumResult> {
    let (max_iter, verbosity) = options.unwrap_or(MAX_ITER_EQUILIBRIUM);
    conditions.validate()?;
    if compsets.is_empty() {
        return Err(CalphadError::InvalidConditions(String::from(
            "at least one composition set is required",
        )));
    }

    let num_statevars = conditions.num_statevars;
    let num_components = conditions.num_components;

    let mut chemical_potentials = conditions.initial_chemical_potentials.clone();
    let mut phase_amt: Array1<f64> = compsets.iter().map(|c| c.phase_amount).collect();
    let mut free_stable: Vec<usize> = (0..compsets.len())
        .filter(|&idx| phase_amt[idx] > MIN_SITE_FRACTION)
        .collect();
    let mut delta_statevars = Array1::<f64>::zeros(num_statevars);

    let mut workspaces: Vec<PhaseWorkspace> = compsets
        .iter()
        .map(|c| PhaseWorkspace::new(c, num_statevars, num_components))
        .collect();
    let mut phase_energies = Array1::<f64>::zeros(compsets.len());
    let mut phase_masses = Array2::<f64>::zeros((compsets.len(), num_components));

    let mut converged = false;
    let mut iterations = 0;

    log_iter!(
        verbosity,
        " iter |  mass residual | constraint res | stable phases"
    );
    log_iter!(verbosity, "{:-<50}", "");

    for iteration in 1..=max_iter {
        iterations = iteration;
        let mut current_elemental_amounts = Array1::<f64>::zeros(num_components);
        let mut largest_internal_cons_max_residual: f64 = 0.0;
        let mut largest_internal_dof_change: f64 = 0.0;

        // internal correction of every phase, stable or metastable
        for (idx, (compset, ws)) in compsets.iter_mut().zip(workspaces.iter_mut()).enumerate() {
            let max_cons = phase_system::compute_phase_system(
                ws,
                compset,
                &delta_statevars,
                &chemical_potentials,
                num_statevars,
            )?;
            largest_internal_cons_max_residual = largest_internal_cons_max_residual.max(max_cons);

            let internal_soln = phase_system::solve_phase_system(ws, compset)?;
            for i in 0..compset.phase_record.phase_dof() {
                let old = compset.dof[num_statevars + i];
                let new = f64::max(MIN_SITE_FRACTION, f64::min(1.0, old + internal_soln[i]));
                largest_internal_dof_change = largest_internal_dof_change.max((new - old).abs());
                compset.dof[num_statevars + i] = new;
            }

            let energy = compset.phase_record.energy(compset.dof.view());
            if !energy.is_finite() {
                return Err(CalphadError::NonFiniteValue(
                    compset.name().to_string(),
                    "energy",
                ));
            }
            phase_energies[idx] = energy;
            for c in 0..num_components {
                phase_masses[(idx, c)] = compset.phase_record.moles(compset.dof.view(), c);
            }
            if free_stable.contains(&idx) {
                for c in 0..num_components {
                    current_elemental_amounts[c] += phase_amt[idx] * phase_masses[(idx, c)];
                }
            }
        }

        // the imposed conditions have to leave the global system square
        let equations = free_stable.len() + conditions.prescribed_element_indices.len() + 1;
        let unknowns = conditions.free_chemical_potential_indices.len()
            + free_stable.len()
            + conditions.free_statevar_indices.len();
        if equations != unknowns {
            return Err(CalphadError::GibbsPhaseRuleViolation(equations, unknowns));
        }

        let system = EquilibriumSystem::build(
            compsets,
            &mut workspaces,
            conditions,
            &free_stable,
            phase_amt.view(),
            &chemical_potentials,
            phase_energies.view(),
            phase_masses.view(),
            current_elemental_amounts.view(),
        )?;
        let global_soln = lstsq::solve_least_squares(&system.matrix, &system.rhs, verbosity)?;
        let applied = solution::apply_solution(
            &global_soln,
            compsets,
            conditions,
            &free_stable,
            &mut chemical_potentials,
            phase_amt.view_mut(),
            &mut delta_statevars,
        );

        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:14.8e} | {:4}",
            iteration,
            system.mass_residual,
            largest_internal_cons_max_residual,
            free_stable.len()
        );

        let changes = convergence::IterationChanges {
            mass_residual: system.mass_residual,
            largest_internal_cons_max_residual,
            largest_internal_dof_change,
            largest_phase_amt_change: applied.largest_phase_amt_change,
            largest_statevar_change: applied.largest_statevar_change,
        };
        if convergence::update_stable_set(
            compsets,
            &mut free_stable,
            phase_amt.view(),
            chemical_potentials.view(),
            phase_energies.view(),
            phase_masses.view(),
            &changes,
            verbosity,
        ) {
            converged = true;
            break;
        }
    }

    for (compset, &amount) in compsets.iter_mut().zip(phase_amt.iter()) {
        compset.phase_amount = amount;
    }

    if converged {
        log_result!(
            verbosity,
            "Equilibrium calculation converged in {} iteration(s)\n",
            iterations
        );
    } else {
        log_result!(
            verbosity,
            "Equilibrium calculation did not converge within {} iteration(s)\n",
            iterations
        );
    }

    let internal_dof: usize = compsets
        .iter()
        .map(|c| c.phase_record.phase_dof())
        .sum();
    let mut x = Vec::with_capacity(num_statevars + internal_dof + compsets.len());
    x.extend(compsets[0].dof.iter().take(num_statevars));
    for compset in compsets.iter() {
        x.extend(compset.internal_dof().iter());
    }
    x.extend(phase_amt.iter());

    Ok(EquilibriumResult {
        converged,
        iterations,
        x: Array1::from(x),
        chemical_potentials,
    })
}

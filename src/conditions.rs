use crate::errors::{CalphadError, CalphadResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// The imposed conditions of an equilibrium calculation.
///
/// Component and state-variable indices are partitioned into a free part
/// (solved for) and a fixed part (imposed). Mass balances are prescribed per
/// element together with a total system amount. The conditions are immutable
/// for the duration of a [`find_solution`](crate::find_solution) call.
///
/// The global system of equations is only well posed if the partition
/// satisfies the Gibbs phase rule,
/// `free chemical potentials + free state variables = prescribed elements + 1`;
/// this is checked on every iteration of the solver.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EquilibriumConditions {
    /// Number of state variables shared by all phases.
    pub num_statevars: usize,
    /// Number of components of the system.
    pub num_components: usize,
    /// Component indices whose chemical potentials are unknowns.
    pub free_chemical_potential_indices: Vec<usize>,
    /// Component indices whose chemical potentials are imposed.
    pub fixed_chemical_potential_indices: Vec<usize>,
    /// Starting values of all chemical potentials, component-indexed.
    pub initial_chemical_potentials: Array1<f64>,
    /// State-variable indices that are unknowns.
    pub free_statevar_indices: Vec<usize>,
    /// State-variable indices that are imposed.
    pub fixed_statevar_indices: Vec<usize>,
    /// Element indices with a prescribed amount.
    pub prescribed_element_indices: Vec<usize>,
    /// Prescribed amount in moles for every entry of
    /// `prescribed_element_indices`.
    pub prescribed_elemental_amounts: Vec<f64>,
    /// Prescribed total system amount in moles.
    pub prescribed_system_amount: f64,
}

impl EquilibriumConditions {
    /// Check the structural consistency of the conditions.
    pub fn validate(&self) -> CalphadResult<()> {
        if self.prescribed_element_indices.len() != self.prescribed_elemental_amounts.len() {
            return Err(CalphadError::InvalidConditions(format!(
                "{} prescribed elements but {} prescribed amounts",
                self.prescribed_element_indices.len(),
                self.prescribed_elemental_amounts.len()
            )));
        }
        if self.initial_chemical_potentials.len() != self.num_components {
            return Err(CalphadError::InvalidConditions(format!(
                "{} initial chemical potentials for {} components",
                self.initial_chemical_potentials.len(),
                self.num_components
            )));
        }
        let component_indices = self
            .free_chemical_potential_indices
            .iter()
            .chain(self.fixed_chemical_potential_indices.iter())
            .chain(self.prescribed_element_indices.iter());
        for &c in component_indices {
            if c >= self.num_components {
                return Err(CalphadError::InvalidConditions(format!(
                    "component index {} out of range for {} components",
                    c, self.num_components
                )));
            }
        }
        let statevar_indices = self
            .free_statevar_indices
            .iter()
            .chain(self.fixed_statevar_indices.iter());
        for &s in statevar_indices {
            if s >= self.num_statevars {
                return Err(CalphadError::InvalidConditions(format!(
                    "state variable index {} out of range for {} state variables",
                    s, self.num_statevars
                )));
            }
        }
        Ok(())
    }
}

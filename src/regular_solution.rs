use crate::errors::{CalphadError, CalphadResult};
use crate::phase_record::PhaseRecord;
use crate::GAS_CONSTANT;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regular solution parameters for a single component.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegularSolutionRecord {
    /// reference Gibbs energy in J/mol
    pub g_ref: f64,
}

impl fmt::Display for RegularSolutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegularSolutionRecord(g_ref={} J/mol)", self.g_ref)
    }
}

/// A substitutional solution phase on a single sublattice.
///
/// The Gibbs energy per mole of formula units is
/// `G = Σᵢ yᵢ g_ref,ᵢ + R T Σᵢ yᵢ ln yᵢ + ½ ΣᵢΣⱼ Lᵢⱼ yᵢ yⱼ`
/// with site fractions `yᵢ` as the internal degrees of freedom, bound by the
/// single constraint `Σᵢ yᵢ = 1`. Temperature is the first state variable;
/// further state variables do not enter the model. All derivatives are closed
/// form, which makes the phase the reference model of the crate.
pub struct RegularSolutionPhase {
    name: String,
    num_statevars: usize,
    g_ref: Array1<f64>,
    interaction: Array2<f64>,
}

impl RegularSolutionPhase {
    /// Build a phase from per-component records and a symmetric matrix of
    /// binary interaction energies.
    pub fn from_records(
        name: &str,
        num_statevars: usize,
        records: &[RegularSolutionRecord],
        interaction: Array2<f64>,
    ) -> CalphadResult<Self> {
        let n = records.len();
        if num_statevars == 0 {
            return Err(CalphadError::IncompatibleParameters(String::from(
                "at least one state variable (temperature) is required.",
            )));
        }
        if interaction.dim() != (n, n) {
            return Err(CalphadError::IncompatibleParameters(format!(
                "interaction matrix of shape {:?} for {} components.",
                interaction.dim(),
                n
            )));
        }
        let g_ref = records.iter().map(|r| r.g_ref).collect();
        Ok(Self {
            name: name.to_string(),
            num_statevars,
            g_ref,
            interaction,
        })
    }

    /// Build an ideal solution phase, i.e. a phase without interaction
    /// energies.
    pub fn ideal(name: &str, num_statevars: usize, g_ref: &[f64]) -> CalphadResult<Self> {
        let records: Vec<_> = g_ref
            .iter()
            .map(|&g| RegularSolutionRecord { g_ref: g })
            .collect();
        let n = g_ref.len();
        Self::from_records(name, num_statevars, &records, Array2::zeros((n, n)))
    }

    fn components(&self) -> usize {
        self.g_ref.len()
    }
}

impl PhaseRecord for RegularSolutionPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase_dof(&self) -> usize {
        self.components()
    }

    fn num_internal_cons(&self) -> usize {
        1
    }

    fn energy(&self, dof: ArrayView1<f64>) -> f64 {
        let s = self.num_statevars;
        let t = dof[0];
        let mut energy = 0.0;
        for i in 0..self.components() {
            let y = dof[s + i];
            energy += y * self.g_ref[i] + GAS_CONSTANT * t * y * y.ln();
            for j in 0..self.components() {
                energy += 0.5 * self.interaction[(i, j)] * y * dof[s + j];
            }
        }
        energy
    }

    fn energy_gradient(&self, mut out: ArrayViewMut1<f64>, dof: ArrayView1<f64>) {
        let s = self.num_statevars;
        let t = dof[0];
        out.fill(0.0);
        for i in 0..self.components() {
            let y = dof[s + i];
            out[0] += GAS_CONSTANT * y * y.ln();
            let mut g = self.g_ref[i] + GAS_CONSTANT * t * (y.ln() + 1.0);
            for j in 0..self.components() {
                g += self.interaction[(i, j)] * dof[s + j];
            }
            out[s + i] = g;
        }
    }

    fn energy_hessian(&self, mut out: ArrayViewMut2<f64>, dof: ArrayView1<f64>) {
        let s = self.num_statevars;
        let t = dof[0];
        out.fill(0.0);
        for i in 0..self.components() {
            let y = dof[s + i];
            out[(0, s + i)] = GAS_CONSTANT * (y.ln() + 1.0);
            out[(s + i, 0)] = out[(0, s + i)];
            for j in 0..self.components() {
                out[(s + i, s + j)] = self.interaction[(i, j)];
            }
            out[(s + i, s + i)] = GAS_CONSTANT * t / y;
        }
    }

    fn moles(&self, dof: ArrayView1<f64>, component: usize) -> f64 {
        dof[self.num_statevars + component]
    }

    fn moles_gradient(&self, mut out: ArrayViewMut1<f64>, _dof: ArrayView1<f64>, component: usize) {
        out.fill(0.0);
        out[self.num_statevars + component] = 1.0;
    }

    fn internal_cons(&self, mut out: ArrayViewMut1<f64>, dof: ArrayView1<f64>) {
        let s = self.num_statevars;
        out[0] = dof.iter().skip(s).sum::<f64>() - 1.0;
    }

    fn internal_cons_jacobian(&self, mut out: ArrayViewMut2<f64>, _dof: ArrayView1<f64>) {
        out.fill(0.0);
        for i in 0..self.components() {
            out[(0, self.num_statevars + i)] = 1.0;
        }
    }
}

//! Assembly and solution of the per-phase system for the internal degrees of
//! freedom.
//!
//! Every phase minimizes its Gibbs energy with respect to its internal
//! degrees of freedom subject to its internal equality constraints, at the
//! current chemical potentials and the currently proposed state-variable
//! increment. The stationarity conditions form the saddle-point system
//!
//! ```text
//! [ H_yy  Jᵀ ] [ δy ]   [ -g_y - H_ys·δs + Σ_c μ_c ∂m_c/∂y ]
//! [ J     0  ] [ λ  ] = [ -c(y)                             ]
//! ```
//!
//! whose upper-left block of the inverse (the `e_matrix`) also condenses the
//! phase response into the global equilibrium system.

use crate::composition_set::CompositionSet;
use crate::errors::{CalphadError, CalphadResult};
use ndarray::{Array1, Array2};
use ndarray_stats::QuantileExt;
use num_dual::{FactorizeIntoDual, SolveDual};

/// Scratch storage for one phase, reused across iterations.
///
/// All buffers are zeroed before reuse; the evaluator-facing buffers are in
/// addition completely overwritten by the phase record on every call.
pub(crate) struct PhaseWorkspace {
    pub grad: Array1<f64>,
    pub hess: Array2<f64>,
    pub mass_jac: Array2<f64>,
    pub cons: Array1<f64>,
    pub cons_jac: Array2<f64>,
    pub phase_matrix: Array2<f64>,
    pub phase_rhs: Array1<f64>,
    pub e_matrix: Array2<f64>,
    pub c_g: Array1<f64>,
    pub c_statevars: Array2<f64>,
    pub c_component: Array2<f64>,
}

impl PhaseWorkspace {
    pub fn new(compset: &CompositionSet, num_statevars: usize, num_components: usize) -> Self {
        let d = compset.phase_record.phase_dof();
        let k = compset.phase_record.num_internal_cons();
        let n = num_statevars + d;
        Self {
            grad: Array1::zeros(n),
            hess: Array2::zeros((n, n)),
            mass_jac: Array2::zeros((num_components, n)),
            cons: Array1::zeros(k),
            cons_jac: Array2::zeros((k, n)),
            phase_matrix: Array2::zeros((d + k, d + k)),
            phase_rhs: Array1::zeros(d + k),
            e_matrix: Array2::zeros((d, d)),
            c_g: Array1::zeros(d),
            c_statevars: Array2::zeros((d, num_statevars)),
            c_component: Array2::zeros((num_components, d)),
        }
    }

    fn reset(&mut self) {
        self.grad.fill(0.0);
        self.hess.fill(0.0);
        self.mass_jac.fill(0.0);
        self.cons.fill(0.0);
        self.cons_jac.fill(0.0);
        self.phase_matrix.fill(0.0);
        self.phase_rhs.fill(0.0);
        self.e_matrix.fill(0.0);
        self.c_g.fill(0.0);
        self.c_statevars.fill(0.0);
        self.c_component.fill(0.0);
    }
}

/// Evaluate the phase derivatives at the current degrees of freedom and fill
/// the saddle-point matrix.
pub(crate) fn compute_phase_matrix(
    ws: &mut PhaseWorkspace,
    compset: &CompositionSet,
    num_statevars: usize,
) -> CalphadResult<()> {
    let record = &compset.phase_record;
    let d = record.phase_dof();
    let k = record.num_internal_cons();
    let x = compset.dof.view();

    ws.reset();
    record.energy_gradient(ws.grad.view_mut(), x);
    record.energy_hessian(ws.hess.view_mut(), x);
    record.internal_cons_jacobian(ws.cons_jac.view_mut(), x);
    for c in 0..ws.mass_jac.nrows() {
        record.moles_gradient(ws.mass_jac.row_mut(c), x, c);
    }
    if ws.grad.iter().any(|g| !g.is_finite()) {
        return Err(CalphadError::NonFiniteValue(
            record.name().to_string(),
            "gradient",
        ));
    }
    if ws.hess.iter().any(|h| !h.is_finite()) {
        return Err(CalphadError::NonFiniteValue(
            record.name().to_string(),
            "Hessian",
        ));
    }

    for i in 0..d {
        for j in 0..d {
            ws.phase_matrix[(i, j)] = ws.hess[(num_statevars + i, num_statevars + j)];
        }
        for con in 0..k {
            ws.phase_matrix[(i, d + con)] = ws.cons_jac[(con, num_statevars + i)];
            ws.phase_matrix[(d + con, i)] = ws.cons_jac[(con, num_statevars + i)];
        }
    }
    Ok(())
}

/// Fill the full saddle-point system and return the largest absolute internal
/// constraint residual as the feasibility gauge of the phase.
pub(crate) fn compute_phase_system(
    ws: &mut PhaseWorkspace,
    compset: &CompositionSet,
    delta_statevars: &Array1<f64>,
    chemical_potentials: &Array1<f64>,
    num_statevars: usize,
) -> CalphadResult<f64> {
    compute_phase_matrix(ws, compset, num_statevars)?;

    let record = &compset.phase_record;
    let d = record.phase_dof();
    let k = record.num_internal_cons();
    record.internal_cons(ws.cons.view_mut(), compset.dof.view());

    for i in 0..d {
        let mut rhs = -ws.grad[num_statevars + i];
        for sv in 0..num_statevars {
            rhs -= ws.hess[(num_statevars + i, sv)] * delta_statevars[sv];
        }
        for c in 0..ws.mass_jac.nrows() {
            rhs += chemical_potentials[c] * ws.mass_jac[(c, num_statevars + i)];
        }
        ws.phase_rhs[i] = rhs;
    }
    for con in 0..k {
        ws.phase_rhs[d + con] = -ws.cons[con];
    }

    Ok(ws.cons.mapv(f64::abs).max().map_or(0.0, |&m| m))
}

/// Solve the saddle-point system; the first `phase_dof` entries of the
/// solution are the internal correction δy.
pub(crate) fn solve_phase_system(
    ws: &PhaseWorkspace,
    compset: &CompositionSet,
) -> CalphadResult<Array1<f64>> {
    ws.phase_matrix
        .solve(&ws.phase_rhs)
        .map_err(|_| CalphadError::SingularPhaseMatrix(compset.name().to_string()))
}

/// Condense the phase response into the vectors entering the global system.
///
/// The upper-left `phase_dof` block of the inverse saddle-point matrix is
/// obtained column by column from one factorization; projecting gradient,
/// state-variable Hessian and mass Jacobian through it yields the response of
/// the internal degrees of freedom to changes of the global unknowns
/// (Sundman et al., Comput. Mater. Sci. 101 (2015)).
pub(crate) fn condense_phase_response(
    ws: &mut PhaseWorkspace,
    compset: &CompositionSet,
    num_statevars: usize,
) -> CalphadResult<()> {
    let record = &compset.phase_record;
    let d = record.phase_dof();
    let k = record.num_internal_cons();

    let lu = ws
        .phase_matrix
        .clone()
        .factorize_into_dual()
        .map_err(|_| CalphadError::SingularPhaseMatrix(compset.name().to_string()))?;
    let mut unit = Array1::zeros(d + k);
    for i in 0..d {
        unit.fill(0.0);
        unit[i] = 1.0;
        let column = ws
            .phase_matrix
            .solve_recursive_into(&lu, unit.clone())
            .map_err(|_| CalphadError::SingularPhaseMatrix(compset.name().to_string()))?;
        for j in 0..d {
            ws.e_matrix[(j, i)] = column[j];
        }
    }

    for i in 0..d {
        let mut c_g = 0.0;
        for j in 0..d {
            c_g -= ws.e_matrix[(i, j)] * ws.grad[num_statevars + j];
        }
        ws.c_g[i] = c_g;
        for sv in 0..num_statevars {
            let mut c_sv = 0.0;
            for j in 0..d {
                c_sv -= ws.e_matrix[(i, j)] * ws.hess[(num_statevars + j, sv)];
            }
            ws.c_statevars[(i, sv)] = c_sv;
        }
    }
    for c in 0..ws.mass_jac.nrows() {
        for i in 0..d {
            let mut c_mu = 0.0;
            for j in 0..d {
                c_mu += ws.mass_jac[(c, num_statevars + j)] * ws.e_matrix[(i, j)];
            }
            ws.c_component[(c, i)] = c_mu;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regular_solution::RegularSolutionPhase;
    use crate::GAS_CONSTANT;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};
    use std::rc::Rc;

    fn ideal_compset(y: &[f64]) -> CompositionSet {
        let phase = RegularSolutionPhase::ideal("LIQUID", 2, &vec![0.0; y.len()]).unwrap();
        CompositionSet::new(Rc::new(phase), &[1000.0, 1e5], y, 1.0)
    }

    #[test]
    fn stationary_at_consistent_chemical_potentials() -> CalphadResult<()> {
        // at μ_i = g_i + RT ln y_i the internal correction vanishes
        let compset = ideal_compset(&[0.7, 0.3]);
        let rt = GAS_CONSTANT * 1000.0;
        let chemical_potentials = arr1(&[rt * 0.7f64.ln(), rt * 0.3f64.ln()]);
        let mut ws = PhaseWorkspace::new(&compset, 2, 2);

        let max_cons = compute_phase_system(
            &mut ws,
            &compset,
            &Array1::zeros(2),
            &chemical_potentials,
            2,
        )?;
        assert_abs_diff_eq!(max_cons, 0.0, epsilon = 1e-14);

        let delta_y = solve_phase_system(&ws, &compset)?;
        assert_abs_diff_eq!(delta_y[0], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(delta_y[1], 0.0, epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn e_matrix_annihilates_constraint_directions() -> CalphadResult<()> {
        // the condensed response keeps Σδy = 0, so e · 1 = 0
        let compset = ideal_compset(&[0.6, 0.4]);
        let mut ws = PhaseWorkspace::new(&compset, 2, 2);
        compute_phase_matrix(&mut ws, &compset, 2)?;
        condense_phase_response(&mut ws, &compset, 2)?;
        for i in 0..2 {
            let row_sum: f64 = (0..2).map(|j| ws.e_matrix[(i, j)]).sum();
            assert_abs_diff_eq!(row_sum, 0.0, epsilon = 1e-12);
        }
        Ok(())
    }

    struct DegeneratePhase;

    impl crate::PhaseRecord for DegeneratePhase {
        fn name(&self) -> &str {
            "DEGENERATE"
        }
        fn phase_dof(&self) -> usize {
            2
        }
        fn num_internal_cons(&self) -> usize {
            2
        }
        fn energy(&self, _dof: ArrayView1<f64>) -> f64 {
            0.0
        }
        fn energy_gradient(&self, mut out: ArrayViewMut1<f64>, _dof: ArrayView1<f64>) {
            out.fill(0.0);
        }
        fn energy_hessian(&self, mut out: ArrayViewMut2<f64>, _dof: ArrayView1<f64>) {
            out.fill(0.0);
        }
        fn moles(&self, _dof: ArrayView1<f64>, _component: usize) -> f64 {
            0.0
        }
        fn moles_gradient(
            &self,
            mut out: ArrayViewMut1<f64>,
            _dof: ArrayView1<f64>,
            _component: usize,
        ) {
            out.fill(0.0);
        }
        fn internal_cons(&self, mut out: ArrayViewMut1<f64>, _dof: ArrayView1<f64>) {
            out.fill(0.0);
        }
        fn internal_cons_jacobian(&self, mut out: ArrayViewMut2<f64>, _dof: ArrayView1<f64>) {
            // two identical constraints make the saddle point singular
            out.fill(1.0);
        }
    }

    #[test]
    fn singular_phase_matrix_is_fatal() {
        let compset = CompositionSet::new(Rc::new(DegeneratePhase), &[300.0, 1e5], &[0.5, 0.5], 1.0);
        let mut ws = PhaseWorkspace::new(&compset, 2, 2);
        let res = compute_phase_system(&mut ws, &compset, &Array1::zeros(2), &arr1(&[0.0, 0.0]), 2);
        assert!(res.is_ok());
        assert!(matches!(
            solve_phase_system(&ws, &compset),
            Err(CalphadError::SingularPhaseMatrix(_))
        ));
    }
}

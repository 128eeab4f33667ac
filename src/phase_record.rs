use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2};

/// Thermodynamic callbacks of a single phase.
///
/// All functions are evaluated at a degree-of-freedom vector `dof` of length
/// `S + D`, where `S` is the number of state variables of the problem
/// (temperature, pressure, ...) and `D = phase_dof()` is the number of
/// internal degrees of freedom (site fractions) of the phase. Gradients and
/// Hessians are taken with respect to the full vector in this order.
///
/// Vector and matrix results are written into caller-owned buffers which are
/// completely overwritten on every call; scalar results are returned by
/// value. All phases of one calculation share the same component indexing.
pub trait PhaseRecord {
    /// Name of the phase, used in diagnostics.
    fn name(&self) -> &str;

    /// Number of internal degrees of freedom.
    fn phase_dof(&self) -> usize;

    /// Number of internal equality constraints.
    fn num_internal_cons(&self) -> usize;

    /// Molar Gibbs energy per formula unit.
    fn energy(&self, dof: ArrayView1<f64>) -> f64;

    /// Gradient of the molar Gibbs energy, shape `S + D`.
    fn energy_gradient(&self, out: ArrayViewMut1<f64>, dof: ArrayView1<f64>);

    /// Hessian of the molar Gibbs energy, shape `(S + D) x (S + D)`, symmetric.
    fn energy_hessian(&self, out: ArrayViewMut2<f64>, dof: ArrayView1<f64>);

    /// Moles of component `component` per mole of formula units.
    fn moles(&self, dof: ArrayView1<f64>, component: usize) -> f64;

    /// Gradient of [`PhaseRecord::moles`], shape `S + D`.
    fn moles_gradient(&self, out: ArrayViewMut1<f64>, dof: ArrayView1<f64>, component: usize);

    /// Residuals of the internal equality constraints, shape `K`.
    fn internal_cons(&self, out: ArrayViewMut1<f64>, dof: ArrayView1<f64>);

    /// Jacobian of the internal equality constraints, shape `K x (S + D)`.
    fn internal_cons_jacobian(&self, out: ArrayViewMut2<f64>, dof: ArrayView1<f64>);
}

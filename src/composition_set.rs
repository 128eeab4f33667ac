use crate::phase_record::PhaseRecord;
use ndarray::{s, Array1, ArrayView1};
use std::fmt;
use std::rc::Rc;

/// A phase together with its mutable per-phase state.
///
/// The `dof` vector concatenates the state variables of the problem with the
/// internal degrees of freedom of the phase. Composition sets are created by
/// the caller and mutated in place by the solver; on return they carry the
/// equilibrium state.
pub struct CompositionSet {
    /// Thermodynamic callbacks of the underlying phase model.
    pub phase_record: Rc<dyn PhaseRecord>,
    /// State variables followed by the internal degrees of freedom.
    pub dof: Array1<f64>,
    /// Amount of the phase in moles of formula units.
    pub phase_amount: f64,
}

impl CompositionSet {
    /// Create a new composition set from initial state variables, internal
    /// degrees of freedom and an initial phase amount.
    pub fn new(
        phase_record: Rc<dyn PhaseRecord>,
        statevars: &[f64],
        internal_dof: &[f64],
        phase_amount: f64,
    ) -> Self {
        let mut dof = Array1::zeros(statevars.len() + internal_dof.len());
        dof.slice_mut(s![..statevars.len()])
            .assign(&ArrayView1::from(statevars));
        dof.slice_mut(s![statevars.len()..])
            .assign(&ArrayView1::from(internal_dof));
        Self {
            phase_record,
            dof,
            phase_amount,
        }
    }

    /// Name of the underlying phase.
    pub fn name(&self) -> &str {
        self.phase_record.name()
    }

    /// The internal degrees of freedom, i.e. the `dof` vector without its
    /// state-variable prefix.
    pub fn internal_dof(&self) -> ArrayView1<f64> {
        let num_statevars = self.dof.len() - self.phase_record.phase_dof();
        self.dof.slice(s![num_statevars..])
    }
}

impl fmt::Display for CompositionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: NP={:.6e}, y={:.6}",
            self.name(),
            self.phase_amount,
            self.internal_dof()
        )
    }
}

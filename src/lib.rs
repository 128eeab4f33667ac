//! Core data structures and equilibrium solver of the `calphad-rs` project.
//!
//! The crate revolves around two abstractions:
//! - [`PhaseRecord`]: a trait that provides the thermodynamic callbacks of a
//!   single phase (energy, gradient, Hessian, per-component moles, internal
//!   constraints) over a degree-of-freedom vector that concatenates the state
//!   variables with the internal site fractions of the phase.
//! - [`CompositionSet`]: a phase record together with its mutable state, i.e.
//!   the current degree-of-freedom vector and the phase amount.
//!
//! Given a set of composition sets and [`EquilibriumConditions`], the
//! [`find_solution`] driver iterates a two-step block Newton scheme: every
//! iteration first relaxes the internal degrees of freedom of every phase
//! against its own constrained stationarity conditions, then solves a global
//! linear system in the free chemical potentials, the free phase-amount
//! increments, and the free state-variable increments. Phases enter and leave
//! the set of stable phases dynamically, driven by their amounts and driving
//! forces.

// Iteration output, gated by `Verbosity`. The macros are declared ahead of the
// modules so they are in scope everywhere in the crate.
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if let $crate::Verbosity::Iter = $verbosity {
            println!($($arg)*);
        }
    };
}

macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Result {
            println!($($arg)*);
        }
    };
}

mod composition_set;
mod conditions;
mod errors;
mod phase_record;
mod regular_solution;
mod solver;

pub use composition_set::CompositionSet;
pub use conditions::EquilibriumConditions;
pub use errors::{CalphadError, CalphadResult};
pub use phase_record::PhaseRecord;
pub use regular_solution::{RegularSolutionPhase, RegularSolutionRecord};
pub use solver::{find_solution, EquilibriumResult, SolverOptions, Verbosity};

/// Universal gas constant in J/mol/K.
pub const GAS_CONSTANT: f64 = 8.31446261815324;

/// Smallest admissible internal degree of freedom (site fraction).
///
/// Internal degrees of freedom are clipped to `[MIN_SITE_FRACTION, 1]` after
/// every update; phases with an amount at or below this floor are treated as
/// unstable. The value has to match the floor used by the phase models to
/// avoid clipping oscillations.
pub const MIN_SITE_FRACTION: f64 = 1e-12;

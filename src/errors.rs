use thiserror::Error;

/// Error type for improperly posed equilibrium problems and evaluation failures.
#[derive(Error, Debug)]
pub enum CalphadError {
    #[error("The imposed conditions violate the Gibbs phase rule: {0} equations for {1} unknowns.")]
    GibbsPhaseRuleViolation(usize, usize),
    #[error("The internal system of phase `{0}` is singular.")]
    SingularPhaseMatrix(String),
    #[error("Evaluation of phase `{0}` returned a non-finite {1}.")]
    NonFiniteValue(String, &'static str),
    #[error("The global equilibrium system could not be solved: {0}")]
    LinearSolveFailed(&'static str),
    #[error("Invalid conditions: {0}")]
    InvalidConditions(String),
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
}

/// Convenience type for `Result<T, CalphadError>`.
pub type CalphadResult<T> = Result<T, CalphadError>;

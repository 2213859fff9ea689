use thiserror::Error;

/// Failure codes reported by a [`Propagator`](crate::propagator::Propagator).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    #[error("Eccentricity out of range: {0}")]
    EccentricityOutOfRange(f64),

    #[error("Mean motion must be positive: {0}")]
    NonPositiveMeanMotion(f64),

    #[error("Orbit has decayed (perigee radius {0} km)")]
    Decayed(f64),

    #[error("Propagator returned error code {0}")]
    Code(i32),
}

#[derive(Error, Debug)]
pub enum TleFitError {
    #[error("Malformed element set: {0}")]
    MalformedElementSet(String),

    #[error("Malformed ephemeris record: {0}")]
    MalformedEphemeris(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Propagation failed: {0}")]
    Propagation(#[from] PropagationError),

    #[error("Invalid fit parameter: {0}")]
    InvalidFitParameter(String),

    #[error("Invalid orbit determination parameter: {0}")]
    InvalidOdParameter(String),

    #[error("Degenerate geometry for the Gibbs method: {0}")]
    DegenerateGeometry(String),

    #[error("Not enough observations: need {needed}, got {got}")]
    NotEnoughObservations { needed: usize, got: usize },

    #[error("Unknown reference frame: {0}")]
    UnknownFrame(String),

    #[error("Jacobian dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Normal matrix is singular")]
    SingularNormalMatrix,

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Unable to build the task worker pool: {0}")]
    WorkerPool(String),
}

impl PartialEq for TleFitError {
    fn eq(&self, other: &Self) -> bool {
        use TleFitError::*;
        match (self, other) {
            (MalformedElementSet(a), MalformedElementSet(b)) => a == b,
            (MalformedEphemeris(a), MalformedEphemeris(b)) => a == b,
            (IoError(_), IoError(_)) => true,
            (Propagation(a), Propagation(b)) => a == b,
            (InvalidFitParameter(a), InvalidFitParameter(b)) => a == b,
            (InvalidOdParameter(a), InvalidOdParameter(b)) => a == b,
            (DegenerateGeometry(a), DegenerateGeometry(b)) => a == b,
            (
                NotEnoughObservations { needed: n1, got: g1 },
                NotEnoughObservations { needed: n2, got: g2 },
            ) => n1 == n2 && g1 == g2,
            (UnknownFrame(a), UnknownFrame(b)) => a == b,
            (DimensionMismatch(a), DimensionMismatch(b)) => a == b,
            (WorkerPool(a), WorkerPool(b)) => a == b,

            (SingularNormalMatrix, SingularNormalMatrix) => true,
            (Cancelled, Cancelled) => true,

            _ => false,
        }
    }
}

//! Error types for the polyhedral back end.
//!
//! Errors are organized by the phase that produces them. Every failure
//! is fatal to the current compilation and names the statement or array
//! involved so that an outer driver can attach source locations.

use thiserror::Error;
use std::fmt;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum PolyError {
    /// The polyhedral model is inconsistent or malformed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Scheduling or periodicity detection failed
    #[error("Scheduling error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Storage allocation failed
    #[error("Storage allocation error: {0}")]
    Storage(#[from] StorageError),

    /// The integer set layer could not answer a query
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Loop nest construction failed
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolyError {
    /// Classification of the error for drivers that react per kind.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PolyError::Model(e) => match e.kind {
                ModelErrorKind::UnknownStatement | ModelErrorKind::UnknownDimension => {
                    ErrorCategory::UserConfig
                }
                _ => ErrorCategory::ModelConsistency,
            },
            PolyError::Schedule(e) => match e.kind {
                ScheduleErrorKind::MultipleRays
                | ScheduleErrorKind::InconsistentDirections
                | ScheduleErrorKind::InconsistentOffsets
                | ScheduleErrorKind::UnsupportedStructure => ErrorCategory::UnsupportedInput,
                ScheduleErrorKind::UnknownStatement | ScheduleErrorKind::UnknownDimension => {
                    ErrorCategory::UserConfig
                }
                _ => ErrorCategory::Infeasible,
            },
            PolyError::Storage(e) => match e.kind {
                StorageErrorKind::ReadersWithoutWriters => ErrorCategory::ModelConsistency,
                StorageErrorKind::InfiniteConflictDistance => ErrorCategory::Infeasible,
            },
            PolyError::Solver(_) | PolyError::Codegen(_) | PolyError::Internal(_) => {
                ErrorCategory::Internal
            }
            PolyError::Io(_) => ErrorCategory::Internal,
        }
    }
}

/// Coarse error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The model contradicts itself (e.g. an array read but never written)
    ModelConsistency,
    /// The model uses a pattern this back end does not handle
    UnsupportedInput,
    /// No schedule or storage assignment exists
    Infeasible,
    /// A configuration option names something that does not exist
    UserConfig,
    /// Solver limits or internal failures
    Internal,
}

/// Error in the polyhedral model itself.
#[derive(Error, Debug, Clone)]
pub struct ModelError {
    /// The error message
    pub message: String,
    /// The kind of model error
    pub kind: ModelErrorKind,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ModelError {
    /// Create a new model error.
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// A name is defined twice
    DuplicateName,
    /// A referenced statement does not exist
    UnknownStatement,
    /// A referenced array does not exist
    UnknownArray,
    /// A referenced dimension does not exist
    UnknownDimension,
    /// Relation or domain does not fit its space
    DimensionMismatch,
    /// A model description could not be read
    InvalidDescription,
}

/// Error during scheduling and periodicity detection.
#[derive(Error, Debug, Clone)]
pub struct ScheduleError {
    /// The error message
    pub message: String,
    /// The kind of scheduling error
    pub kind: ScheduleErrorKind,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ScheduleError {
    /// Create a new scheduling error.
    pub fn new(kind: ScheduleErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }

    pub fn multiple_rays(what: impl fmt::Display) -> Self {
        Self::new(
            ScheduleErrorKind::MultipleRays,
            format!("Multiple rays in {}.", what),
        )
    }

    pub fn inconsistent_directions() -> Self {
        Self::new(
            ScheduleErrorKind::InconsistentDirections,
            "Inconsistent infinite directions of access schedules.",
        )
    }

    pub fn inconsistent_offsets(array: &str) -> Self {
        Self::new(
            ScheduleErrorKind::InconsistentOffsets,
            format!("Accesses have inconsistent tile offsets in array space (array {}).", array),
        )
    }

    pub fn unknown_statement(name: &str) -> Self {
        Self::new(
            ScheduleErrorKind::UnknownStatement,
            format!("No statement named {}.", name),
        )
    }

    pub fn unknown_dimension(name: &str, dim: usize) -> Self {
        Self::new(
            ScheduleErrorKind::UnknownDimension,
            format!("Statement {} has no schedule dimension {}.", name, dim),
        )
    }

    pub fn infinite_dimension(name: &str, dim: usize) -> Self {
        Self::new(
            ScheduleErrorKind::InfiniteDimension,
            format!("Schedule dimension is infinite: statement {}, dimension {}.", name, dim),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleErrorKind {
    /// An access or domain recedes in more than one direction
    MultipleRays,
    /// Accesses disagree on the tiling dimension
    InconsistentDirections,
    /// Accesses to one array disagree on the per-period data offset
    InconsistentOffsets,
    /// The schedule tree has a shape the periodic decomposition rejects
    UnsupportedStructure,
    /// No valid schedule could be found
    NoValidSchedule,
    /// A schedule maps a dependency backwards in time
    DependencyViolation,
    /// Reversal target dimension is unbounded
    InfiniteDimension,
    /// Reversal names an unknown statement
    UnknownStatement,
    /// Reversal names an unknown dimension
    UnknownDimension,
}

/// Error during storage allocation.
#[derive(Error, Debug, Clone)]
pub struct StorageError {
    /// The error message
    pub message: String,
    /// The kind of storage error
    pub kind: StorageErrorKind,
    /// Name of the array being allocated
    pub array: String,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StorageError {
    pub fn readers_without_writers(array: &str) -> Self {
        Self {
            message: format!("Array {} has readers but no writers.", array),
            kind: StorageErrorKind::ReadersWithoutWriters,
            array: array.to_string(),
        }
    }

    pub fn infinite_distance(array: &str, dim: usize) -> Self {
        Self {
            message: format!(
                "Infinite storage conflict distance for array {}, dimension {}.",
                array, dim
            ),
            kind: StorageErrorKind::InfiniteConflictDistance,
            array: array.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Array has readers but no writers
    ReadersWithoutWriters,
    /// Conflict distance is unbounded
    InfiniteConflictDistance,
}

/// Error raised by the integer set layer.
#[derive(Error, Debug, Clone)]
pub struct SolverError {
    /// The error message
    pub message: String,
    /// The kind of solver error
    pub kind: SolverErrorKind,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl SolverError {
    pub fn new(kind: SolverErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverErrorKind {
    /// Branch and bound exceeded its node budget
    NodeLimit,
    /// Coefficients outgrew the arithmetic range
    Overflow,
    /// Operation needs an enumeration over an unbounded set
    Unbounded,
    /// Operands live in different spaces
    SpaceMismatch,
}

/// Error during loop nest construction.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// A loop has no lower or upper bound
    BoundGeneration,
    /// Statement iterators cannot be recovered from the schedule
    NonInvertibleSchedule,
}

/// Result type using PolyError.
pub type PolyResult<T> = Result<T, PolyError>;

/// Outcome of a component that may legitimately not apply.
///
/// Errors travel in the surrounding `Result`; "does not apply" is an
/// ordinary value carrying the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The component did its work
    Applied(T),
    /// Nothing to do, with the reason
    NotApplicable(String),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// The applied value, if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::NotApplicable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: PolyError = ScheduleError::unknown_statement("foo").into();
        let s = format!("{}", err);
        assert!(s.contains("No statement named foo."));
        assert_eq!(err.category(), ErrorCategory::UserConfig);
    }

    #[test]
    fn test_storage_messages() {
        let err = StorageError::readers_without_writers("x");
        assert!(err.to_string().contains("has readers but no writers"));
        let err: PolyError = StorageError::infinite_distance("x", 0).into();
        assert!(err.to_string().contains("Infinite storage conflict distance"));
        assert_eq!(err.category(), ErrorCategory::Infeasible);
    }

    #[test]
    fn test_unsupported_category() {
        let err: PolyError = ScheduleError::inconsistent_directions().into();
        assert_eq!(err.category(), ErrorCategory::UnsupportedInput);
        assert!(err
            .to_string()
            .contains("Inconsistent infinite directions of access schedules"));
    }
}

//! Provides the error types used throughout this crate.

use thiserror::Error;

/// Raised when a mechanism definition is malformed at construction time.
///
/// These are the only fatal errors in the crate: a mechanism that cannot be
/// built is rejected immediately instead of failing on every frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MechanismError {
    #[error("link {name:?} must have a positive length, got {length}")]
    NonPositiveLinkLength { name: String, length: f64 },
    #[error("link {link:?} references unknown joint {joint:?}")]
    UnknownJoint { link: String, joint: String },
    #[error("joint name not unique: {0}")]
    DuplicateJoint(String),
}

/// A per-solve failure. Every solver entry point returns these as values so
/// that a caller driving hundreds of animation frames can skip or
/// hold-last-position on one bad frame without aborting the sequence.
///
/// Generic over the scalar type because the constraint solver is; the
/// closed-form mechanism solvers use the `f64` default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError<F = f64> {
    /// The driving parameter places the joints outside the geometrically
    /// reachable range (triangle inequality violated).
    #[error("unreachable configuration: joint separation {separation:?} outside [{min:?}, {max:?}]")]
    UnreachableConfiguration { separation: F, min: F, max: F },
    /// A velocity or adjustment formula's denominator is at or near zero.
    #[error("singular configuration: denominator {denominator:?} is numerically zero")]
    SingularConfiguration { denominator: F },
    /// No closed form is derived for this mechanism or constraint kind.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// The iterative solver exhausted its iteration budget.
    #[error("did not converge after {iterations} iterations, residual {residual:?}")]
    NonConvergence { iterations: usize, residual: F },
}

//! ## About
//!
//! This crate contains closed-form and constraint-based kinematics for
//! planar linkage mechanisms in robotics and animation. It provides
//! position and velocity solvers for four-bar and slider-crank mechanisms,
//! a Grashof-condition classifier, six-bar topology definitions, and a
//! general iterative solver for systems of distance/angle/position
//! constraints used as a fallback for topologies without a closed form.
//!
//! Every solver entry point is a pure function of its explicit inputs: a
//! mechanism (immutable after construction) plus one driving scalar per
//! animation frame, or a point list plus a constraint set. Failures are
//! typed values ([`SolveError`]), never panics, so a caller driving
//! hundreds of frames can skip or hold-last-position on a bad frame.
//! Memoization is opt-in through a caller-owned [`PoseCache`].
//!
//! See [`FourBarLinkage`] to get started.
//!
//! ## Reading list
//!
//! * [Four-bar linkage analysis](https://en.wikipedia.org/wiki/Four-bar_linkage)
//! * [Slider-crank kinematics](https://en.wikipedia.org/wiki/Slider-crank_linkage)
//!
//! ## Naming conventions
//! * Traits – adjectives or role nouns that indicate capability
//! * Structs – substantives that indicate entities implementing a behavior
//! * Methods – imperative forms with the exception of getters and factories,
//!             which use substantives (i.e., omit a `get_` prefix) much like
//!             the standard library

pub mod cache;
pub mod constraint;
pub mod errors;
pub mod four_bar;
pub mod mechanism;
pub mod motion;
pub mod six_bar;
pub mod slider_crank;

pub use cache::{CacheKey, PoseCache};
pub use constraint::{
    Constraint, ConstraintId, ConstraintKind, ConstraintSolution, ConstraintSystem, SolverConfig,
};
pub use errors::{MechanismError, SolveError};
pub use four_bar::{FourBarLinkage, FourBarPose, FourBarVelocities, GrashofClass, GrashofReport};
pub use mechanism::{Joint, JointKind, Link, Linkage, LinkageKind, Pose};
pub use motion::MotionProfile;
pub use six_bar::{SixBarLinkage, SixBarPose, SixBarTopology};
pub use slider_crank::{SliderCrankMechanism, SliderCrankPose, SliderCrankVelocities};

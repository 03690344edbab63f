/*! Data model shared by the mechanism solvers: joints, links, and the
 * type-erased pose contract an animation layer consumes frame by frame.
 *
 * A mechanism is constructed once per design with fixed link lengths and is
 * immutable for its lifetime. Solving never mutates the mechanism; a new
 * driving value produces a new, independent pose.
 */

use std::collections::{BTreeMap, HashSet};

use nalgebra::{Point3, Vector3};

use crate::errors::{MechanismError, SolveError};

/// Joint classification. Positions of [`JointKind::Fixed`] joints never
/// change after construction; revolute and prismatic joint positions are
/// recomputed on every solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    Fixed,
    Revolute,
    Prismatic,
}

/// Definition of a single joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Unique within a mechanism
    pub name: String,
    pub position: Point3<f64>,
    pub kind: JointKind,
    /// Rotation or translation axis for revolute/prismatic joints
    pub axis: Vector3<f64>,
    /// Optional travel limits in radians (min, max)
    pub limits: Option<(f64, f64)>,
}

impl Joint {
    pub fn fixed(name: &str, position: Point3<f64>) -> Self {
        Joint {
            name: name.to_string(),
            position,
            kind: JointKind::Fixed,
            axis: Vector3::z(),
            limits: None,
        }
    }

    pub fn revolute(name: &str) -> Self {
        Joint {
            name: name.to_string(),
            position: Point3::origin(),
            kind: JointKind::Revolute,
            axis: Vector3::z(),
            limits: Some((-std::f64::consts::PI, std::f64::consts::PI)),
        }
    }

    pub fn prismatic(name: &str, axis: Vector3<f64>) -> Self {
        Joint {
            name: name.to_string(),
            position: Point3::origin(),
            kind: JointKind::Prismatic,
            axis,
            limits: None,
        }
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some((min, max));
        self
    }
}

/// Definition of a single rigid link between two joints.
///
/// The length is set at mechanism construction and is immutable. Mass and
/// inertia are carried through for consumers that need them but are not used
/// by the kinematics solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub length: f64,
    pub start_joint: String,
    pub end_joint: String,
    pub mass: f64,
    pub inertia: f64,
}

impl Link {
    pub fn new(name: &str, length: f64, start_joint: &str, end_joint: &str) -> Self {
        Link {
            name: name.to_string(),
            length,
            start_joint: start_joint.to_string(),
            end_joint: end_joint.to_string(),
            mass: 1.0,
            inertia: 1.0,
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = inertia;
        self
    }
}

/// The supported kinematic topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkageKind {
    FourBar,
    SliderCrank,
    SixBarWatt,
    SixBarStephenson,
}

impl std::fmt::Display for LinkageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkageKind::FourBar => "four_bar",
            LinkageKind::SliderCrank => "slider_crank",
            LinkageKind::SixBarWatt => "six_bar_watt",
            LinkageKind::SixBarStephenson => "six_bar_stephenson",
        };
        write!(f, "{name}")
    }
}

/// Type-erased solve result: one position per joint, in the mechanism's
/// joint order, plus the link angles by link name.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub joint_positions: Vec<Point3<f64>>,
    pub link_angles: BTreeMap<String, f64>,
}

/// The uniform driving contract over all mechanism solvers.
///
/// An animation layer calls [`Linkage::pose_at`] with one driving scalar
/// (input or crank angle in radians) per frame. Failures are values, never
/// panics, so a caller can skip or hold-last-position on a bad frame.
pub trait Linkage {
    fn kind(&self) -> LinkageKind;

    fn joints(&self) -> &[Joint];

    fn links(&self) -> &[Link];

    /// Solve joint positions for one value of the driving parameter.
    fn pose_at(&self, driver: f64) -> Result<Pose, SolveError>;
}

/// Rejects malformed mechanism definitions at construction time.
pub(crate) fn validate(joints: &[Joint], links: &[Link]) -> Result<(), MechanismError> {
    let mut names = HashSet::new();
    for joint in joints {
        if !names.insert(joint.name.as_str()) {
            return Err(MechanismError::DuplicateJoint(joint.name.clone()));
        }
    }
    for link in links {
        if link.length <= 0.0 {
            return Err(MechanismError::NonPositiveLinkLength {
                name: link.name.clone(),
                length: link.length,
            });
        }
        for joint in [&link.start_joint, &link.end_joint] {
            if !names.contains(joint.as_str()) {
                return Err(MechanismError::UnknownJoint {
                    link: link.name.clone(),
                    joint: joint.clone(),
                });
            }
        }
    }
    Ok(())
}

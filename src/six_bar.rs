/*! Six-bar linkage topologies (Watt and Stephenson).
 *
 * The data model is complete; the position solve is not. A six-bar needs a
 * loop-closure solve (two coupled four-bar loops) for which no closed form
 * is derived here, so [`SixBarLinkage::solve_positions`] reports
 * [`SolveError::NotImplemented`] instead of fabricating coordinates.
 */

use std::fmt;

use nalgebra::Point3;
use tracing::debug;

use crate::errors::{MechanismError, SolveError};
use crate::mechanism::{validate, Joint, Link, Linkage, LinkageKind, Pose};

/// Which of the two six-bar chain arrangements a linkage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SixBarTopology {
    /// Two four-bar chains sharing a common link
    Watt,
    Stephenson,
}

impl fmt::Display for SixBarTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SixBarTopology::Watt => write!(f, "watt"),
            SixBarTopology::Stephenson => write!(f, "stephenson"),
        }
    }
}

/// Joint positions for one value of the input angle, once a loop-closure
/// solve exists. Joint order: ground 1, joints 1 through 4, ground 2.
#[derive(Debug, Clone, PartialEq)]
pub struct SixBarPose {
    pub joint_positions: [Point3<f64>; 6],
    pub input_angle: f64,
}

impl From<SixBarPose> for Pose {
    fn from(pose: SixBarPose) -> Self {
        Pose {
            joint_positions: pose.joint_positions.to_vec(),
            link_angles: Default::default(),
        }
    }
}

/// Six-bar linkage definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SixBarLinkage {
    topology: SixBarTopology,
    joints: Vec<Joint>,
    links: Vec<Link>,
}

impl SixBarLinkage {
    /// Build a six-bar linkage with the canonical link lengths for the
    /// chosen topology.
    pub fn new(topology: SixBarTopology) -> Result<Self, MechanismError> {
        let lengths = match topology {
            SixBarTopology::Watt => [10.0, 3.0, 8.0, 6.0, 4.0, 7.0],
            SixBarTopology::Stephenson => [12.0, 3.0, 9.0, 5.0, 7.0, 6.0],
        };
        Self::with_link_lengths(topology, lengths)
    }

    /// Build a six-bar linkage with custom link lengths, ground first.
    pub fn with_link_lengths(
        topology: SixBarTopology,
        lengths: [f64; 6],
    ) -> Result<Self, MechanismError> {
        let joints = vec![
            Joint::fixed("ground_1", Point3::origin()),
            Joint::revolute("joint_1"),
            Joint::revolute("joint_2"),
            Joint::revolute("joint_3"),
            Joint::revolute("joint_4"),
            Joint::fixed("ground_2", Point3::new(lengths[0], 0.0, 0.0)),
        ];
        let links = vec![
            Link::new("ground", lengths[0], "ground_1", "ground_2"),
            Link::new("link_1", lengths[1], "ground_1", "joint_1"),
            Link::new("link_2", lengths[2], "joint_1", "joint_2"),
            Link::new("link_3", lengths[3], "joint_2", "joint_3"),
            Link::new("link_4", lengths[4], "joint_3", "joint_4"),
            Link::new("link_5", lengths[5], "joint_4", "ground_2"),
        ];
        validate(&joints, &links)?;
        debug!(%topology, "six-bar linkage created");
        Ok(SixBarLinkage {
            topology,
            joints,
            links,
        })
    }

    pub fn topology(&self) -> SixBarTopology {
        self.topology
    }

    /// Position analysis needs an iterative loop-closure solve that is not
    /// derived yet; this always reports [`SolveError::NotImplemented`].
    pub fn solve_positions(&self, _input_angle: f64) -> Result<SixBarPose, SolveError> {
        Err(SolveError::NotImplemented("six-bar loop-closure solve"))
    }
}

impl Linkage for SixBarLinkage {
    fn kind(&self) -> LinkageKind {
        match self.topology {
            SixBarTopology::Watt => LinkageKind::SixBarWatt,
            SixBarTopology::Stephenson => LinkageKind::SixBarStephenson,
        }
    }

    fn joints(&self) -> &[Joint] {
        &self.joints
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn pose_at(&self, driver: f64) -> Result<Pose, SolveError> {
        self.solve_positions(driver).map(Pose::from)
    }
}

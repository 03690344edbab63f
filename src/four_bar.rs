/*! Closed-form kinematics for the planar four-bar linkage.
 *
 * The classic loop of ground, input, coupler, and output links. Positions
 * come from a circle intersection (law of cosines on the open triangle),
 * velocities from a simplified sine relation. The Grashof classifier
 * predicts which links can fully rotate.
 */

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{Point2, Point3, Vector2};
use tracing::debug;

use crate::errors::{MechanismError, SolveError};
use crate::mechanism::{validate, Joint, Link, Linkage, LinkageKind, Pose};

/// Below this, a velocity denominator counts as singular.
const SINGULARITY_EPS: f64 = 1e-9;

/// Grashof-derived motion classification of a four-bar linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrashofClass {
    /// Ground link shortest, one complete rotation possible
    CrankRocker,
    /// Input or output link shortest, both cranks rotate completely
    DoubleCrank,
    /// Coupler link shortest, both links oscillate
    DoubleRocker,
    /// Grashof condition not met, all links oscillate
    TripleRocker,
}

impl GrashofClass {
    /// Human-readable motion characteristic.
    pub fn motion(&self) -> &'static str {
        match self {
            GrashofClass::CrankRocker => "One complete rotation possible",
            GrashofClass::DoubleCrank => "Both cranks can rotate completely",
            GrashofClass::DoubleRocker => "Both links oscillate",
            GrashofClass::TripleRocker => "All links oscillate",
        }
    }
}

impl fmt::Display for GrashofClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GrashofClass::CrankRocker => "Crank-Rocker",
            GrashofClass::DoubleCrank => "Double-Crank",
            GrashofClass::DoubleRocker => "Double-Rocker",
            GrashofClass::TripleRocker => "Triple-Rocker",
        };
        write!(f, "{name}")
    }
}

/// Result of [`FourBarLinkage::check_grashof_condition`].
#[derive(Debug, Clone, PartialEq)]
pub struct GrashofReport {
    pub is_grashof: bool,
    pub classification: GrashofClass,
    /// Shortest plus longest link length
    pub grashof_sum: f64,
    /// Sum of the two intermediate link lengths
    pub other_sum: f64,
}

/// Joint positions and link angles for one value of the input angle.
///
/// Joint order: ground start, input joint, coupler joint, ground end.
#[derive(Debug, Clone, PartialEq)]
pub struct FourBarPose {
    pub joint_positions: [Point3<f64>; 4],
    pub input_angle: f64,
    pub coupler_angle: f64,
    pub output_angle: f64,
}

impl From<FourBarPose> for Pose {
    fn from(pose: FourBarPose) -> Self {
        let mut link_angles = BTreeMap::new();
        link_angles.insert("input".to_string(), pose.input_angle);
        link_angles.insert("coupler".to_string(), pose.coupler_angle);
        link_angles.insert("output".to_string(), pose.output_angle);
        Pose {
            joint_positions: pose.joint_positions.to_vec(),
            link_angles,
        }
    }
}

/// Result of [`FourBarLinkage::solve_velocities`].
#[derive(Debug, Clone, PartialEq)]
pub struct FourBarVelocities {
    pub input_velocity: f64,
    pub output_velocity: f64,
    pub velocity_ratio: f64,
    pub coupler_linear_velocity: f64,
    pub coupler_angular_velocity: f64,
}

/// Planar four-bar linkage with the ground link on the x axis.
///
/// Immutable once constructed; every solve is a pure function of the input
/// angle.
#[derive(Debug, Clone, PartialEq)]
pub struct FourBarLinkage {
    ground_length: f64,
    input_length: f64,
    coupler_length: f64,
    output_length: f64,
    joints: Vec<Joint>,
    links: Vec<Link>,
}

impl FourBarLinkage {
    /// Build a four-bar linkage from its four link lengths. Ground joints
    /// are fixed at the origin and at `(ground_length, 0, 0)`.
    pub fn new(
        ground_length: f64,
        input_length: f64,
        coupler_length: f64,
        output_length: f64,
    ) -> Result<Self, MechanismError> {
        let joints = vec![
            Joint::fixed("ground_start", Point3::origin()),
            Joint::revolute("input_joint"),
            Joint::revolute("coupler_joint"),
            Joint::fixed("ground_end", Point3::new(ground_length, 0.0, 0.0)),
        ];
        let links = vec![
            Link::new("ground", ground_length, "ground_start", "ground_end"),
            Link::new("input", input_length, "ground_start", "input_joint"),
            Link::new("coupler", coupler_length, "input_joint", "coupler_joint"),
            Link::new("output", output_length, "coupler_joint", "ground_end"),
        ];
        validate(&joints, &links)?;
        debug!(
            ground_length,
            input_length, coupler_length, output_length, "four-bar linkage created"
        );
        Ok(FourBarLinkage {
            ground_length,
            input_length,
            coupler_length,
            output_length,
            joints,
            links,
        })
    }

    pub fn ground_length(&self) -> f64 {
        self.ground_length
    }

    pub fn input_length(&self) -> f64 {
        self.input_length
    }

    pub fn coupler_length(&self) -> f64 {
        self.coupler_length
    }

    pub fn output_length(&self) -> f64 {
        self.output_length
    }

    /// Check the Grashof condition `s + l <= p + q` and classify the motion
    /// type by which named link is the shortest. Pure function, cannot fail.
    pub fn check_grashof_condition(&self) -> GrashofReport {
        let mut lengths = [
            self.ground_length,
            self.input_length,
            self.coupler_length,
            self.output_length,
        ];
        lengths.sort_by(f64::total_cmp);
        let shortest = lengths[0];
        let longest = lengths[3];

        let grashof_sum = shortest + longest;
        let other_sum = lengths[1] + lengths[2];
        let is_grashof = grashof_sum <= other_sum;

        let classification = if !is_grashof {
            GrashofClass::TripleRocker
        } else if shortest == self.ground_length {
            GrashofClass::CrankRocker
        } else if shortest == self.input_length || shortest == self.output_length {
            GrashofClass::DoubleCrank
        } else {
            GrashofClass::DoubleRocker
        };

        GrashofReport {
            is_grashof,
            classification,
            grashof_sum,
            other_sum,
        }
    }

    /// Solve joint positions for the given input angle.
    ///
    /// Two assembly configurations exist for every reachable input angle
    /// (the output joint lies on either intersection of the coupler and
    /// output circles). This method always selects the same branch, which
    /// can flip the mechanism discontinuously as the input angle sweeps
    /// past certain configurations. Known limitation; use
    /// [`FourBarLinkage::solve_positions_from`] when solving frame
    /// sequences.
    pub fn solve_positions(&self, input_angle: f64) -> Result<FourBarPose, SolveError> {
        self.solve_branch(input_angle, false)
    }

    /// Solve joint positions, selecting the assembly branch that keeps the
    /// output angle closest to the previous frame's solution. With no
    /// previous pose this falls back to [`FourBarLinkage::solve_positions`].
    pub fn solve_positions_from(
        &self,
        input_angle: f64,
        previous: Option<&FourBarPose>,
    ) -> Result<FourBarPose, SolveError> {
        let primary = self.solve_branch(input_angle, false)?;
        let Some(previous) = previous else {
            return Ok(primary);
        };
        let alternate = self.solve_branch(input_angle, true)?;
        let primary_step = wrap_angle(primary.output_angle - previous.output_angle).abs();
        let alternate_step = wrap_angle(alternate.output_angle - previous.output_angle).abs();
        if alternate_step < primary_step {
            Ok(alternate)
        } else {
            Ok(primary)
        }
    }

    fn solve_branch(&self, input_angle: f64, inverted: bool) -> Result<FourBarPose, SolveError> {
        // Ground link fixed positions
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(self.ground_length, 0.0);

        // Input joint on the input circle
        let c = a + self.input_length * Vector2::new(input_angle.cos(), input_angle.sin());

        let bc = c - b;
        let separation = bc.norm();
        let max = self.coupler_length + self.output_length;
        let min = (self.coupler_length - self.output_length).abs();
        if separation > max || separation < min || separation < f64::EPSILON {
            return Err(SolveError::UnreachableConfiguration {
                separation,
                min,
                max,
            });
        }

        let gamma = bc.y.atan2(bc.x);
        let cos_alpha = (self.output_length.powi(2) + separation.powi(2)
            - self.coupler_length.powi(2))
            / (2.0 * self.output_length * separation);
        let alpha = cos_alpha.clamp(-1.0, 1.0).acos();

        let output_angle = if inverted { gamma - alpha } else { gamma + alpha };
        let d = b + self.output_length * Vector2::new(output_angle.cos(), output_angle.sin());

        let cd = d - c;
        let coupler_angle = cd.y.atan2(cd.x);

        Ok(FourBarPose {
            joint_positions: [planar(a), planar(c), planar(d), planar(b)],
            input_angle,
            coupler_angle,
            output_angle,
        })
    }

    /// Approximate velocity analysis from the sine relation between the
    /// link angles. This is not a full vector-loop derivation; it is the
    /// instantaneous ratio the position solution implies.
    pub fn solve_velocities(
        &self,
        input_angle: f64,
        input_velocity: f64,
    ) -> Result<FourBarVelocities, SolveError> {
        let pose = self.solve_positions(input_angle)?;

        let denominator = self.output_length * (pose.output_angle - pose.coupler_angle).sin();
        if denominator.abs() < SINGULARITY_EPS {
            return Err(SolveError::SingularConfiguration { denominator });
        }
        let velocity_ratio =
            self.input_length * (pose.coupler_angle - input_angle).sin() / denominator;

        Ok(FourBarVelocities {
            input_velocity,
            output_velocity: input_velocity * velocity_ratio,
            velocity_ratio,
            coupler_linear_velocity: input_velocity * self.input_length,
            coupler_angular_velocity: input_velocity,
        })
    }
}

impl Linkage for FourBarLinkage {
    fn kind(&self) -> LinkageKind {
        LinkageKind::FourBar
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

fn planar(point: Point2<f64>) -> Point3<f64> {
    Point3::new(point.x, point.y, 0.0)
}

/// Wrap an angle difference into `(-pi, pi]`.
fn wrap_angle(delta: f64) -> f64 {
    delta.sin().atan2(delta.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::{FRAC_PI_2, PI, TAU};
    use test_log::test;

    fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        (b - a).norm()
    }

    #[test]
    fn grashof_double_crank() {
        // Shortest is the input link, 3 + 10 == 8 + 5
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        let report = linkage.check_grashof_condition();
        assert!(report.is_grashof);
        assert_eq!(report.classification, GrashofClass::DoubleCrank);
        assert_eq!(report.classification.to_string(), "Double-Crank");
        assert_abs_diff_eq!(report.grashof_sum, 13.0);
        assert_abs_diff_eq!(report.other_sum, 13.0);
    }

    #[test]
    fn grashof_crank_rocker_when_ground_is_shortest() {
        let linkage = FourBarLinkage::new(2.0, 6.0, 7.0, 5.0).unwrap();
        let report = linkage.check_grashof_condition();
        assert!(report.is_grashof);
        assert_eq!(report.classification, GrashofClass::CrankRocker);
    }

    #[test]
    fn grashof_double_rocker_when_coupler_is_shortest() {
        let linkage = FourBarLinkage::new(6.0, 5.0, 2.0, 7.0).unwrap();
        let report = linkage.check_grashof_condition();
        assert!(report.is_grashof);
        assert_eq!(report.classification, GrashofClass::DoubleRocker);
    }

    #[test]
    fn grashof_triple_rocker() {
        let linkage = FourBarLinkage::new(10.0, 2.0, 3.0, 4.0).unwrap();
        let report = linkage.check_grashof_condition();
        assert!(!report.is_grashof);
        assert_eq!(report.classification, GrashofClass::TripleRocker);
    }

    #[test]
    fn positions_preserve_link_lengths() {
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        for degrees in [0, 30, 60, 90, 120, 180, 270] {
            let pose = linkage.solve_positions(f64::from(degrees).to_radians()).unwrap();
            let [a, c, d, b] = pose.joint_positions;
            assert_abs_diff_eq!(distance(&a, &c), linkage.input_length(), epsilon = 1e-3);
            assert_abs_diff_eq!(distance(&c, &d), linkage.coupler_length(), epsilon = 1e-3);
            assert_abs_diff_eq!(distance(&d, &b), linkage.output_length(), epsilon = 1e-3);
            assert_abs_diff_eq!(distance(&a, &b), linkage.ground_length(), epsilon = 1e-3);
        }
    }

    #[test]
    fn positions_are_periodic() {
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        let pose = linkage.solve_positions(0.7).unwrap();
        let wrapped = linkage.solve_positions(0.7 + TAU).unwrap();
        for (p, q) in pose.joint_positions.iter().zip(wrapped.joint_positions.iter()) {
            assert_abs_diff_eq!(*p, *q, epsilon = 1e-9);
        }
    }

    #[test]
    fn unreachable_angle_is_reported() {
        // At pi the input joint is 11 from the far pivot, beyond 2 + 3
        let linkage = FourBarLinkage::new(10.0, 1.0, 2.0, 3.0).unwrap();
        let result = linkage.solve_positions(PI);
        assert!(matches!(
            result,
            Err(SolveError::UnreachableConfiguration { .. })
        ));
    }

    #[test]
    fn continuity_selection_prefers_the_nearer_branch() {
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        let mut previous = linkage.solve_positions(0.0).unwrap();
        let step = TAU / 256.0;
        for frame in 1..256 {
            let pose = linkage
                .solve_positions_from(f64::from(frame) * step, Some(&previous))
                .unwrap();
            let jump = wrap_angle(pose.output_angle - previous.output_angle).abs();
            let fixed = linkage.solve_positions(f64::from(frame) * step).unwrap();
            let fixed_jump = wrap_angle(fixed.output_angle - previous.output_angle).abs();
            assert!(jump <= fixed_jump + 1e-12);
            previous = pose;
        }
    }

    #[test]
    fn velocities_follow_the_sine_relation() {
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        let pose = linkage.solve_positions(FRAC_PI_2).unwrap();
        let velocities = linkage.solve_velocities(FRAC_PI_2, 2.0).unwrap();
        let expected = linkage.input_length() * (pose.coupler_angle - FRAC_PI_2).sin()
            / (linkage.output_length() * (pose.output_angle - pose.coupler_angle).sin());
        assert_relative_eq!(velocities.velocity_ratio, expected, epsilon = 1e-12);
        assert_relative_eq!(velocities.output_velocity, 2.0 * expected, epsilon = 1e-12);
        assert_abs_diff_eq!(velocities.coupler_linear_velocity, 6.0);
    }

    #[test]
    fn velocity_solve_is_singular_at_full_extension() {
        // At pi the coupler and output links are collinear
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        assert!(linkage.solve_positions(PI).is_ok());
        assert!(matches!(
            linkage.solve_velocities(PI, 1.0),
            Err(SolveError::SingularConfiguration { .. })
        ));
    }

    #[test]
    fn zero_length_link_is_rejected_at_construction() {
        assert!(matches!(
            FourBarLinkage::new(10.0, 0.0, 8.0, 5.0),
            Err(MechanismError::NonPositiveLinkLength { .. })
        ));
    }

    #[test]
    fn pose_at_erases_to_the_common_contract() {
        let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
        let pose = linkage.pose_at(0.5).unwrap();
        assert_eq!(pose.joint_positions.len(), 4);
        assert!(pose.link_angles.contains_key("input"));
        assert!(pose.link_angles.contains_key("coupler"));
        assert!(pose.link_angles.contains_key("output"));
        assert_abs_diff_eq!(pose.link_angles["input"], 0.5);
    }
}

/*! Closed-form kinematics for the slider-crank mechanism.
 *
 * Converts crank rotation into linear slider motion through a connecting
 * rod. The slider travels along the x axis; the crank center sits at the
 * origin.
 */

use std::collections::BTreeMap;

use nalgebra::{Point2, Point3, Vector2, Vector3};
use tracing::debug;

use crate::errors::{MechanismError, SolveError};
use crate::mechanism::{validate, Joint, Link, Linkage, LinkageKind, Pose};

/// Below this, the velocity denominator counts as singular.
const SINGULARITY_EPS: f64 = 1e-9;

/// Joint positions and scalar state for one value of the crank angle.
///
/// Joint order: crank center, crank pin, slider.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderCrankPose {
    pub joint_positions: [Point3<f64>; 3],
    pub crank_angle: f64,
    /// Slider x coordinate
    pub slider_position: f64,
    /// Slider travel relative to the crank-length reference
    pub slider_displacement: f64,
    pub connecting_rod_angle: f64,
}

impl From<SliderCrankPose> for Pose {
    fn from(pose: SliderCrankPose) -> Self {
        let mut link_angles = BTreeMap::new();
        link_angles.insert("crank".to_string(), pose.crank_angle);
        link_angles.insert("connecting_rod".to_string(), pose.connecting_rod_angle);
        Pose {
            joint_positions: pose.joint_positions.to_vec(),
            link_angles,
        }
    }
}

/// Result of [`SliderCrankMechanism::solve_velocities`].
#[derive(Debug, Clone, PartialEq)]
pub struct SliderCrankVelocities {
    pub crank_velocity: f64,
    /// Signed slider velocity along the x axis
    pub slider_velocity: f64,
    pub rod_angular_velocity: f64,
}

/// Slider-crank mechanism with the crank center at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderCrankMechanism {
    crank_length: f64,
    connecting_rod_length: f64,
    joints: Vec<Joint>,
    links: Vec<Link>,
}

impl SliderCrankMechanism {
    pub fn new(crank_length: f64, connecting_rod_length: f64) -> Result<Self, MechanismError> {
        let joints = vec![
            Joint::fixed("crank_center", Point3::origin()),
            Joint::revolute("crank_pin"),
            Joint::prismatic("slider", Vector3::x()),
        ];
        let links = vec![
            Link::new("crank", crank_length, "crank_center", "crank_pin"),
            Link::new(
                "connecting_rod",
                connecting_rod_length,
                "crank_pin",
                "slider",
            ),
        ];
        validate(&joints, &links)?;
        debug!(crank_length, connecting_rod_length, "slider-crank mechanism created");
        Ok(SliderCrankMechanism {
            crank_length,
            connecting_rod_length,
            joints,
            links,
        })
    }

    pub fn crank_length(&self) -> f64 {
        self.crank_length
    }

    pub fn connecting_rod_length(&self) -> f64 {
        self.connecting_rod_length
    }

    /// Solve joint positions for the given crank angle.
    ///
    /// Fails with [`SolveError::UnreachableConfiguration`] whenever the rod
    /// is too short to reach the x axis, i.e. `rod < crank * |sin(angle)|`.
    pub fn solve_positions(&self, crank_angle: f64) -> Result<SliderCrankPose, SolveError> {
        let crank_center = Point2::new(0.0, 0.0);
        let crank_pin = crank_center
            + self.crank_length * Vector2::new(crank_angle.cos(), crank_angle.sin());

        let reach = self.connecting_rod_length.powi(2) - crank_pin.y.powi(2);
        if reach < 0.0 {
            return Err(SolveError::UnreachableConfiguration {
                separation: crank_pin.y.abs(),
                min: 0.0,
                max: self.connecting_rod_length,
            });
        }

        let slider_x = crank_pin.x + reach.sqrt();
        let slider = Point2::new(slider_x, 0.0);

        let rod = slider - crank_pin;
        let connecting_rod_angle = rod.y.atan2(rod.x);

        Ok(SliderCrankPose {
            joint_positions: [planar(crank_center), planar(crank_pin), planar(slider)],
            crank_angle,
            slider_position: slider_x,
            slider_displacement: slider_x - self.crank_length,
            connecting_rod_angle,
        })
    }

    /// Closed-form velocity analysis, the derivative of the position
    /// relation. Fails with [`SolveError::SingularConfiguration`] when
    /// `sqrt(rod^2 - crank^2 sin^2(angle))` is numerically zero.
    pub fn solve_velocities(
        &self,
        crank_angle: f64,
        crank_velocity: f64,
    ) -> Result<SliderCrankVelocities, SolveError> {
        // Reuse the reachability check
        self.solve_positions(crank_angle)?;

        let r = self.crank_length;
        let l = self.connecting_rod_length;
        let sin = crank_angle.sin();
        let cos = crank_angle.cos();

        let denominator = (l.powi(2) - r.powi(2) * sin.powi(2)).sqrt();
        if denominator < SINGULARITY_EPS {
            return Err(SolveError::SingularConfiguration { denominator });
        }

        let slider_velocity = -r * crank_velocity * (sin + r * sin * cos / denominator);
        let rod_angular_velocity = -r * crank_velocity * cos / denominator;

        Ok(SliderCrankVelocities {
            crank_velocity,
            slider_velocity,
            rod_angular_velocity,
        })
    }
}

impl Linkage for SliderCrankMechanism {
    fn kind(&self) -> LinkageKind {
        LinkageKind::SliderCrank
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

//! Integration tests driving the solvers the way an animation layer does:
//! one driving value per frame, typed failures skipped or held, constraint
//! refinement on top of closed-form poses.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Point3, Vector3};
use std::f64::consts::FRAC_PI_2;
use test_log::test;

use linkage::{
    ConstraintSystem, FourBarLinkage, GrashofClass, Linkage, MotionProfile, PoseCache,
    SixBarLinkage, SixBarTopology, SliderCrankMechanism, SolveError,
};

#[test]
fn four_bar_creation_and_grashof_classification() {
    let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
    assert_abs_diff_eq!(linkage.ground_length(), 10.0);
    assert_abs_diff_eq!(linkage.input_length(), 3.0);
    assert_abs_diff_eq!(linkage.coupler_length(), 8.0);
    assert_abs_diff_eq!(linkage.output_length(), 5.0);

    let report = linkage.check_grashof_condition();
    assert!(report.is_grashof);
    assert_eq!(report.classification, GrashofClass::DoubleCrank);
}

#[test]
fn four_bar_sweep_preserves_link_lengths() {
    let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
    for degrees in (0..360).step_by(5) {
        let pose = linkage
            .solve_positions(f64::from(degrees).to_radians())
            .unwrap();
        let [a, c, d, b] = pose.joint_positions;
        assert_abs_diff_eq!((c - a).norm(), 3.0, epsilon = 1e-3);
        assert_abs_diff_eq!((d - c).norm(), 8.0, epsilon = 1e-3);
        assert_abs_diff_eq!((b - d).norm(), 5.0, epsilon = 1e-3);
        assert_abs_diff_eq!((b - a).norm(), 10.0, epsilon = 1e-3);
    }
}

#[test]
fn slider_crank_concrete_case() {
    let mechanism = SliderCrankMechanism::new(2.0, 6.0).unwrap();
    let pose = mechanism.solve_positions(FRAC_PI_2).unwrap();
    assert_abs_diff_eq!(
        pose.joint_positions[1],
        Point3::new(0.0, 2.0, 0.0),
        epsilon = 1e-12
    );
    assert_relative_eq!(pose.slider_position, 32.0_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(
        pose.joint_positions[2],
        Point3::new(32.0_f64.sqrt(), 0.0, 0.0),
        epsilon = 1e-12
    );
}

#[test]
fn animation_loop_holds_last_pose_on_bad_frames() {
    // rod < crank, so part of the revolution is unreachable
    let mechanism = SliderCrankMechanism::new(4.0, 2.0).unwrap();
    let mut last_good = None;
    let mut skipped = 0;
    for (_frame, angle) in MotionProfile::full_rotation().sample(120) {
        match mechanism.pose_at(angle) {
            Ok(pose) => last_good = Some(pose),
            Err(SolveError::UnreachableConfiguration { .. }) => skipped += 1,
            Err(error) => panic!("unexpected failure: {error}"),
        }
    }
    assert!(last_good.is_some());
    assert!(skipped > 0, "the sweep should cross the unreachable arc");
}

#[test]
fn six_bar_never_fabricates_positions() {
    let linkage = SixBarLinkage::new(SixBarTopology::Stephenson).unwrap();
    for (_frame, angle) in MotionProfile::full_rotation().sample(16) {
        assert!(matches!(
            linkage.pose_at(angle),
            Err(SolveError::NotImplemented(_))
        ));
    }
}

#[test]
fn cached_sweep_solves_each_frame_once() {
    let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
    let mut cache = PoseCache::new();
    let frames = MotionProfile::Rotation {
        start: 0.0,
        end: 1.0,
        eased: false,
    }
    .sample(50);

    for (_frame, angle) in &frames {
        cache.pose_or_solve(&linkage, *angle).unwrap();
    }
    assert_eq!(cache.len(), 50);

    // Replaying the same profile hits the cache only
    for (_frame, angle) in &frames {
        cache.pose_or_solve(&linkage, *angle).unwrap();
    }
    assert_eq!(cache.len(), 50);
}

#[test]
fn constraint_refinement_restores_a_perturbed_pose() {
    let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
    let pose = linkage.solve_positions(std::f64::consts::FRAC_PI_4).unwrap();

    // Link lengths plus ground anchors, the constraint image of the linkage
    let mut system = ConstraintSystem::<f64>::new();
    system.add_distance_constraint(0, 1, 3.0, 1.0);
    system.add_distance_constraint(1, 2, 8.0, 1.0);
    system.add_distance_constraint(2, 3, 5.0, 1.0);
    system.add_distance_constraint(0, 3, 10.0, 1.0);
    system.add_position_constraint(0, Point3::origin(), 1.0);
    system.add_position_constraint(3, Point3::new(10.0, 0.0, 0.0), 1.0);

    let wobble = [
        Vector3::new(0.02, -0.01, 0.0),
        Vector3::new(-0.03, 0.02, 0.0),
        Vector3::new(0.01, 0.03, 0.0),
        Vector3::new(-0.02, -0.02, 0.0),
    ];
    let perturbed: Vec<Point3<f64>> = pose
        .joint_positions
        .iter()
        .zip(wobble.iter())
        .map(|(point, offset)| point + offset)
        .collect();

    let solution = system.solve_constraints_bounded(&perturbed, 300);
    assert!(solution.converged, "residual {}", solution.total_error);

    let points = &solution.points;
    assert_abs_diff_eq!((points[1] - points[0]).norm(), 3.0, epsilon = 1e-3);
    assert_abs_diff_eq!((points[2] - points[1]).norm(), 8.0, epsilon = 1e-3);
    assert_abs_diff_eq!((points[3] - points[2]).norm(), 5.0, epsilon = 1e-3);
    assert_abs_diff_eq!((points[3] - points[0]).norm(), 10.0, epsilon = 1e-3);
    assert_abs_diff_eq!(points[0], Point3::origin(), epsilon = 1e-3);
}

#[test]
fn continuity_hint_keeps_a_full_revolution_smooth() {
    let linkage = FourBarLinkage::new(10.0, 3.0, 8.0, 5.0).unwrap();
    let mut previous = None;
    let mut largest_step = 0.0_f64;
    for (_frame, angle) in MotionProfile::full_rotation().sample(360) {
        let pose = linkage
            .solve_positions_from(angle, previous.as_ref())
            .unwrap();
        if let Some(previous) = &previous {
            let delta: f64 = pose.output_angle - previous.output_angle;
            largest_step = largest_step.max(delta.sin().atan2(delta.cos()).abs());
        }
        previous = Some(pose);
    }
    // A double-crank output sweeps smoothly, so per-frame steps stay small
    assert!(largest_step < 0.2, "largest step {largest_step}");
}

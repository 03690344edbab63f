/*! General-purpose iterative solver for systems of geometric constraints.
 *
 * Used standalone for topologies without a closed-form solver, or to
 * validate and refine positions produced elsewhere. Constraints reference
 * indices into a flat, ordered point list; the system holds no point state
 * between calls. Points are passed in and returned, never owned.
 *
 * Generic over the scalar type so a caller can run the solve in `f32` or
 * `f64` as its host data dictates.
 */

use itertools::izip;
use nalgebra::{center, clamp, convert, Point3, RealField, Rotation3, Unit, Vector3};
use tracing::{debug, warn};

use crate::errors::SolveError;

/// Below this, a direction or rotation axis counts as degenerate.
const DIRECTION_EPS: f64 = 1e-9;

/// Identifier handed out on insertion; ids increase monotonically within a
/// [`ConstraintSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub usize);

/// Each geometric constraint we support.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind<F: RealField> {
    /// Points `a` and `b` should be `target` apart.
    Distance { a: usize, b: usize, target: F },
    /// The arms `vertex -> a` and `vertex -> c` should meet at `target`
    /// radians.
    Angle {
        a: usize,
        vertex: usize,
        c: usize,
        target: F,
    },
    /// The point should sit at `target`.
    Position { point: usize, target: Point3<F> },
}

/// A constraint record: kind plus weight and enabled flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<F: RealField> {
    pub kind: ConstraintKind<F>,
    /// Higher weight means enforced more strongly relative to the others
    pub weight: F,
    pub enabled: bool,
}

impl<F: RealField + Copy> Constraint<F> {
    pub fn distance(a: usize, b: usize, target: F) -> Self {
        Constraint {
            kind: ConstraintKind::Distance { a, b, target },
            weight: F::one(),
            enabled: true,
        }
    }

    pub fn angle(a: usize, vertex: usize, c: usize, target: F) -> Self {
        Constraint {
            kind: ConstraintKind::Angle { a, vertex, c, target },
            weight: F::one(),
            enabled: true,
        }
    }

    pub fn position(point: usize, target: Point3<F>) -> Self {
        Constraint {
            kind: ConstraintKind::Position { point, target },
            weight: F::one(),
            enabled: true,
        }
    }

    pub fn with_weight(mut self, weight: F) -> Self {
        self.weight = weight;
        self
    }
}

/// Tuning knobs for the iterative solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig<F: RealField> {
    /// Hard cap on iterations, enforced unconditionally
    pub max_iterations: usize,
    /// Convergence threshold on the weighted error norm
    pub tolerance: F,
    pub damping: F,
    pub step_size: F,
    /// Shrink the step while far from the solution
    pub adaptive_step_size: bool,
}

impl<F: RealField + Copy> Default for SolverConfig<F> {
    fn default() -> Self {
        SolverConfig {
            max_iterations: 100,
            tolerance: convert(1.0e-6),
            damping: convert(0.5),
            step_size: convert(2.0),
            adaptive_step_size: true,
        }
    }
}

/// Outcome of an iterative solve. Carries the best achieved point set even
/// when the iteration budget ran out.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSolution<F: RealField> {
    pub converged: bool,
    pub points: Vec<Point3<F>>,
    /// Weighted error norm at the last evaluation
    pub total_error: F,
    pub iterations: usize,
}

impl<F: RealField + Copy> ConstraintSolution<F> {
    /// Map a non-converged solution to [`SolveError::NonConvergence`].
    pub fn into_result(self) -> Result<Self, SolveError<F>> {
        if self.converged {
            Ok(self)
        } else {
            Err(SolveError::NonConvergence {
                iterations: self.iterations,
                residual: self.total_error,
            })
        }
    }
}

/// A set of constraints over an indexed point list, built incrementally and
/// re-solved as the underlying points move frame to frame.
#[derive(Debug, Clone)]
pub struct ConstraintSystem<F: RealField> {
    constraints: Vec<Constraint<F>>,
    config: SolverConfig<F>,
}

impl<F: RealField + Copy> Default for ConstraintSystem<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: RealField + Copy> ConstraintSystem<F> {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig<F>) -> Self {
        ConstraintSystem {
            constraints: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SolverConfig<F> {
        &self.config
    }

    /// Append a constraint and return its id.
    pub fn add(&mut self, constraint: Constraint<F>) -> ConstraintId {
        let id = ConstraintId(self.constraints.len());
        debug!(id = id.0, "constraint added");
        self.constraints.push(constraint);
        id
    }

    pub fn add_distance_constraint(&mut self, a: usize, b: usize, target: F, weight: F) -> ConstraintId {
        self.add(Constraint::distance(a, b, target).with_weight(weight))
    }

    pub fn add_angle_constraint(
        &mut self,
        a: usize,
        vertex: usize,
        c: usize,
        target: F,
        weight: F,
    ) -> ConstraintId {
        self.add(Constraint::angle(a, vertex, c, target).with_weight(weight))
    }

    pub fn add_position_constraint(
        &mut self,
        point: usize,
        target: Point3<F>,
        weight: F,
    ) -> ConstraintId {
        self.add(Constraint::position(point, target).with_weight(weight))
    }

    pub fn constraints(&self) -> &[Constraint<F>] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint<F>> {
        self.constraints.get(id.0)
    }

    /// Toggle a constraint without removing it. Returns false for an
    /// unknown id.
    pub fn set_enabled(&mut self, id: ConstraintId, enabled: bool) -> bool {
        match self.constraints.get_mut(id.0) {
            Some(constraint) => {
                constraint.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.constraints.iter().filter(|c| c.enabled).count()
    }

    /// Solve all enabled constraints with the configured iteration budget.
    pub fn solve_constraints(&self, points: &[Point3<F>]) -> ConstraintSolution<F> {
        self.solve_constraints_bounded(points, self.config.max_iterations)
    }

    /// Solve all enabled constraints by damped gradient descent on the
    /// weighted squared error.
    ///
    /// `max_iterations` is a hard cap; when it runs out the best achieved
    /// point set is returned with `converged == false`. Constraints that
    /// reference points beyond the list are skipped.
    pub fn solve_constraints_bounded(
        &self,
        points: &[Point3<F>],
        max_iterations: usize,
    ) -> ConstraintSolution<F> {
        if self.enabled_count() == 0 {
            return ConstraintSolution {
                converged: true,
                points: points.to_vec(),
                total_error: F::zero(),
                iterations: 0,
            };
        }

        let tolerance = self.config.tolerance;
        // Normalizing by the largest weight keeps the update scale
        // invariant to the overall weight scale.
        let weight_ceiling = self
            .constraints
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.weight)
            .fold(F::one(), |acc, w| if w > acc { w } else { acc });

        let mut current = points.to_vec();
        let mut gradients: Vec<Vector3<F>> = vec![Vector3::zeros(); current.len()];
        let mut residual = F::zero();

        for iteration in 0..max_iterations {
            let mut total_error = F::zero();
            gradients.iter_mut().for_each(|gradient| *gradient = Vector3::zeros());

            for constraint in self.constraints.iter().filter(|c| c.enabled) {
                let Some(evaluation) = evaluate(&constraint.kind, &current) else {
                    continue;
                };
                total_error += constraint.weight * evaluation.residual * evaluation.residual;
                for (index, gradient) in evaluation.gradients {
                    gradients[index] += gradient * (constraint.weight * evaluation.residual);
                }
            }

            residual = total_error.sqrt();
            if residual < tolerance {
                debug!(iteration, ?residual, "constraint solve converged");
                return ConstraintSolution {
                    converged: true,
                    points: current,
                    total_error: residual,
                    iterations: iteration,
                };
            }

            let mut step = self.config.step_size;
            if self.config.adaptive_step_size {
                let ratio = tolerance / (residual + convert(1.0e-12));
                step *= clamp(ratio, convert(0.1), F::one());
            }
            let factor = step * self.config.damping / weight_ceiling;
            izip!(current.iter_mut(), gradients.iter()).for_each(|(point, gradient)| {
                *point -= gradient * factor;
            });
        }

        warn!(max_iterations, ?residual, "constraint solve exhausted its iteration budget");
        ConstraintSolution {
            converged: false,
            points: current,
            total_error: residual,
            iterations: max_iterations,
        }
    }

    /// Direct, non-iterative adjustment for a single distance or angle
    /// constraint: both endpoints (or both arms) move symmetrically to the
    /// target. Quick local correction; interaction with other constraints
    /// is not considered. The constraint's point indices must be in range.
    ///
    /// Returns the remaining error, which is zero unless the constraint was
    /// already within tolerance.
    pub fn solve_constraint(
        &self,
        constraint: &Constraint<F>,
        points: &mut [Point3<F>],
    ) -> Result<F, SolveError<F>> {
        let eps: F = convert(DIRECTION_EPS);
        match constraint.kind {
            ConstraintKind::Distance { a, b, target } => {
                let delta = points[b] - points[a];
                let length = delta.norm();
                if length < eps {
                    return Err(SolveError::SingularConfiguration { denominator: length });
                }
                let error = (length - target).abs();
                if error < self.config.tolerance {
                    return Ok(error);
                }
                let direction = delta / length;
                let midpoint = center(&points[a], &points[b]);
                let half = target * convert::<f64, F>(0.5);
                points[a] = midpoint - direction * half;
                points[b] = midpoint + direction * half;
                Ok(F::zero())
            }
            ConstraintKind::Angle { a, vertex, c, target } => {
                let arm_a = points[a] - points[vertex];
                let arm_c = points[c] - points[vertex];
                let len_a = arm_a.norm();
                let len_c = arm_c.norm();
                if len_a < eps || len_c < eps {
                    let denominator = if len_a < len_c { len_a } else { len_c };
                    return Err(SolveError::SingularConfiguration { denominator });
                }
                let cos = clamp(arm_a.dot(&arm_c) / (len_a * len_c), -F::one(), F::one());
                let current = cos.acos();
                let error = (current - target).abs();
                if error < self.config.tolerance {
                    return Ok(error);
                }
                let normal = arm_a.cross(&arm_c);
                let normal_length = normal.norm();
                if normal_length < eps {
                    // Collinear arms leave the rotation plane undefined
                    return Err(SolveError::SingularConfiguration {
                        denominator: normal_length,
                    });
                }
                let axis = Unit::new_normalize(normal);
                let half_delta = (target - current) * convert::<f64, F>(0.5);
                // Positive rotation about arm_a x arm_c carries arm_a
                // toward arm_c, so the arms open symmetrically.
                points[a] = points[vertex] + Rotation3::from_axis_angle(&axis, -half_delta) * arm_a;
                points[c] = points[vertex] + Rotation3::from_axis_angle(&axis, half_delta) * arm_c;
                Ok(F::zero())
            }
            ConstraintKind::Position { .. } => {
                Err(SolveError::NotImplemented("direct position adjustment"))
            }
        }
    }
}

/// Scalar residual of one constraint and the partials of that residual for
/// every involved point.
struct Evaluation<F: RealField> {
    residual: F,
    gradients: Vec<(usize, Vector3<F>)>,
}

/// Evaluate a constraint against the current points. `None` means the
/// constraint references points beyond the list. Degenerate geometry
/// (coincident points, undefined angles) contributes no gradient for this
/// iteration.
fn evaluate<F: RealField + Copy>(
    kind: &ConstraintKind<F>,
    points: &[Point3<F>],
) -> Option<Evaluation<F>> {
    let eps: F = convert(DIRECTION_EPS);
    match *kind {
        ConstraintKind::Distance { a, b, target } => {
            let pa = points.get(a)?;
            let pb = points.get(b)?;
            let delta = pb - pa;
            let length = delta.norm();
            let residual = length - target;
            let gradients = if length < eps {
                Vec::new()
            } else {
                let direction = delta / length;
                vec![(a, -direction), (b, direction)]
            };
            Some(Evaluation { residual, gradients })
        }
        ConstraintKind::Angle { a, vertex, c, target } => {
            let pa = points.get(a)?;
            let pv = points.get(vertex)?;
            let pc = points.get(c)?;
            let arm_a = pa - pv;
            let arm_c = pc - pv;
            let len_a = arm_a.norm();
            let len_c = arm_c.norm();
            if len_a < eps || len_c < eps {
                return Some(Evaluation {
                    residual: F::zero(),
                    gradients: Vec::new(),
                });
            }
            let u = arm_a / len_a;
            let w = arm_c / len_c;
            let cos = clamp(u.dot(&w), -F::one(), F::one());
            let residual = cos.acos() - target;
            let sin = (F::one() - cos * cos).sqrt();
            let gradients = if sin < eps {
                Vec::new()
            } else {
                let grad_a = (u * cos - w) / (len_a * sin);
                let grad_c = (w * cos - u) / (len_c * sin);
                let grad_vertex = -(grad_a + grad_c);
                vec![(a, grad_a), (vertex, grad_vertex), (c, grad_c)]
            };
            Some(Evaluation { residual, gradients })
        }
        ConstraintKind::Position { point, target } => {
            let p = points.get(point)?;
            let offset = p - target;
            let length = offset.norm();
            let gradients = if length < eps {
                Vec::new()
            } else {
                vec![(point, offset / length)]
            };
            Some(Evaluation {
                residual: length,
                gradients,
            })
        }
    }
}

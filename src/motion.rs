/*! Pure driving-angle profiles for frame-by-frame sampling.
 *
 * A profile maps normalized progress through an animation to the driving
 * scalar a mechanism solver consumes. No host scene state, no I/O.
 */

use std::f64::consts::TAU;

/// How the driving angle evolves over an animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionProfile {
    /// Sweep from `start` to `end`, optionally eased with the smoothstep
    /// curve for softer endpoints.
    Rotation { start: f64, end: f64, eased: bool },
    /// Sinusoidal oscillation about zero.
    Oscillation { amplitude: f64, frequency: f64 },
    /// Constant driver.
    Hold { angle: f64 },
}

impl MotionProfile {
    /// One full uneased revolution.
    pub fn full_rotation() -> Self {
        MotionProfile::Rotation {
            start: 0.0,
            end: TAU,
            eased: false,
        }
    }

    /// Driving angle at `progress`, clamped into `[0, 1]`.
    pub fn angle_at(&self, progress: f64) -> f64 {
        let progress = progress.clamp(0.0, 1.0);
        match *self {
            MotionProfile::Rotation { start, end, eased } => {
                let p = if eased {
                    progress * progress * (3.0 - 2.0 * progress)
                } else {
                    progress
                };
                start + p * (end - start)
            }
            MotionProfile::Oscillation { amplitude, frequency } => {
                amplitude * (TAU * frequency * progress).sin()
            }
            MotionProfile::Hold { angle } => angle,
        }
    }

    /// Sample one driving angle per frame. Frames are numbered from 1, the
    /// way keyframe consumers expect; a single frame samples the start.
    pub fn sample(&self, frame_count: usize) -> Vec<(usize, f64)> {
        (0..frame_count)
            .map(|frame| {
                let progress = if frame_count > 1 {
                    frame as f64 / (frame_count - 1) as f64
                } else {
                    0.0
                };
                (frame + 1, self.angle_at(progress))
            })
            .collect()
    }
}

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::HydraulicProfile;
use crate::config::{
    PROFILE_ANGLE_TOLERANCE, PROFILE_FIXED_POINT_ITERATIONS, PROFILE_NEWTON_ITERATIONS,
};

/// Weight of the newest sine term in the damped fixed-point update; the
/// previous iterate gets the rest.
const FIXED_POINT_WEIGHT: f64 = 0.5;

/// Circular pipe of inner diameter `d`.
///
/// All quantities are parameterized by the half-angle
/// `α(h) = arccos(1 − h/r)` subtended at the pipe centre by the water surface
/// chord:
///
/// - `A(h) = d²/8 · (2α − sin 2α)`
/// - `P(h) = d · α`
/// - `R(h) = d/4 · (1 − sin 2α / 2α)`
///
/// `h <= 0` gives zeros, `h >= d` gives the full-pipe values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircularProfile {
    diameter: f64,
}

impl CircularProfile {
    pub fn new(diameter: f64) -> Self {
        Self { diameter }
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn radius(&self) -> f64 {
        self.diameter * 0.5
    }

    /// Half-angle `α` for a partially filled pipe (`0 < h < d`).
    pub fn half_angle(&self, h: f64) -> f64 {
        (1.0 - h / self.radius()).acos()
    }

    /// Central angle `θ = 2α` from the fixed-point scheme below, before the
    /// water level is derived from it.
    ///
    /// Solves `θ − sin θ = gap` with `gap = 2π·A/A_total` by the damped
    /// iteration `θₙ₊₁ = gap + w·sin θₙ + (1 − w)·sin θₙ₋₁`, seeded with
    /// `θ₀ = gap`. This is an approximation: convergence is slow close to an
    /// empty or full pipe, where `cos θ → 1`, and the loop stops after
    /// [`PROFILE_FIXED_POINT_ITERATIONS`] rounds whether or not it converged.
    /// The returned flag tells whether the tolerance was reached.
    pub fn central_angle_fixed_point(&self, area: f64) -> (f64, bool) {
        let gap = TAU * area / self.total_area();
        let mut previous = gap;
        let mut current = gap;
        for _ in 0..PROFILE_FIXED_POINT_ITERATIONS {
            let next = gap
                + FIXED_POINT_WEIGHT * current.sin()
                + (1.0 - FIXED_POINT_WEIGHT) * previous.sin();
            let next = next.clamp(0.0, TAU);
            if (next - current).abs() < PROFILE_ANGLE_TOLERANCE {
                return (next, true);
            }
            previous = current;
            current = next;
        }
        (current, false)
    }

    /// Bracketed Newton refinement of `θ − sin θ = gap` on `[0, 2π]`,
    /// capped at [`PROFILE_NEWTON_ITERATIONS`] steps. Steps that would leave
    /// the bracket fall back to bisection.
    fn polish_central_angle(gap: f64, start: f64) -> f64 {
        let (mut lo, mut hi) = (0.0, TAU);
        let mut theta = start.clamp(lo, hi);
        for _ in 0..PROFILE_NEWTON_ITERATIONS {
            let residual = theta - theta.sin() - gap;
            if residual < 0.0 {
                lo = theta;
            } else {
                hi = theta;
            }
            let slope = 1.0 - theta.cos();
            let newton = theta - residual / slope;
            let next = if newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
            if (next - theta).abs() < PROFILE_ANGLE_TOLERANCE {
                return next;
            }
            theta = next;
        }
        theta
    }
}

impl HydraulicProfile for CircularProfile {
    fn height(&self) -> f64 {
        self.diameter
    }

    fn total_area(&self) -> f64 {
        PI * self.diameter * self.diameter * 0.25
    }

    fn flow_area(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        if h >= self.diameter {
            return self.total_area();
        }
        let two_alpha = 2.0 * self.half_angle(h);
        self.diameter * self.diameter / 8.0 * (two_alpha - two_alpha.sin())
    }

    fn wetted_perimeter(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        if h >= self.diameter {
            return PI * self.diameter;
        }
        self.diameter * self.half_angle(h)
    }

    fn hydraulic_radius(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        if h >= self.diameter {
            return self.diameter * 0.25;
        }
        let two_alpha = 2.0 * self.half_angle(h);
        self.diameter * 0.25 * (1.0 - two_alpha.sin() / two_alpha)
    }

    fn top_width(&self, h: f64) -> f64 {
        if h <= 0.0 || h >= self.diameter {
            return 0.0;
        }
        self.diameter * self.half_angle(h).sin()
    }

    fn water_level_by_flow_area(&self, area: f64) -> f64 {
        if area <= 0.0 {
            return 0.0;
        }
        if area >= self.total_area() {
            return self.diameter;
        }
        // The fixed-point pass stalls near an empty or full pipe; a bracketed
        // Newton polish finishes those cases.
        let (theta, converged) = self.central_angle_fixed_point(area);
        let theta = if converged {
            theta
        } else {
            let gap = TAU * area / self.total_area();
            Self::polish_central_angle(gap, theta)
        };
        self.radius() * (1.0 - (theta * 0.5).cos())
    }
}

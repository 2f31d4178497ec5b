//! Closed-form pipe cross-section hydraulics.
//!
//! A profile maps a water level `h` (metres above the sole) to flow area,
//! wetted perimeter, hydraulic radius and free-surface width, and maps a flow
//! area back to a water level. Callers only see [`HydraulicProfile`]; the
//! concrete shapes are variants of [`Profile`].

mod circular;
mod rectangular;

use serde::{Deserialize, Serialize};

pub use circular::CircularProfile;
pub use rectangular::RectangularProfile;

pub trait HydraulicProfile {
    /// Inner height of the cross-section (m).
    fn height(&self) -> f64;

    /// Area of the completely filled cross-section (m²).
    fn total_area(&self) -> f64;

    /// Wetted flow area at water level `h` (m²).
    fn flow_area(&self, h: f64) -> f64;

    /// Length of the wetted boundary at water level `h` (m).
    fn wetted_perimeter(&self, h: f64) -> f64;

    /// Flow area over wetted perimeter (m).
    fn hydraulic_radius(&self, h: f64) -> f64;

    /// Width of the free water surface at level `h` (m). Zero for a full
    /// closed conduit.
    fn top_width(&self, h: f64) -> f64;

    /// Water level that produces the given flow area (m).
    fn water_level_by_flow_area(&self, area: f64) -> f64;

    /// Four times the hydraulic radius (m).
    fn hydraulic_diameter(&self, h: f64) -> f64 {
        4.0 * self.hydraulic_radius(h)
    }

    /// Mean velocity of discharge `q` (m³/s) at water level `h`. An empty
    /// section gives NaN or infinity; callers filter non-finite values.
    fn flow_velocity(&self, q: f64, h: f64) -> f64 {
        q / self.flow_area(h)
    }

    /// Filled share of the cross-section area, in `[0, 1]`.
    fn fill_ratio(&self, h: f64) -> f64 {
        self.flow_area(h) / self.total_area()
    }
}

/// Cross-section shapes known to the network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Profile {
    Circular(CircularProfile),
    Rectangular(RectangularProfile),
}

impl Profile {
    pub fn circular(diameter: f64) -> Self {
        Profile::Circular(CircularProfile::new(diameter))
    }

    pub fn rectangular(width: f64, height: f64) -> Self {
        Profile::Rectangular(RectangularProfile::new(width, height))
    }
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $e:expr) => {
        match $self {
            Profile::Circular($p) => $e,
            Profile::Rectangular($p) => $e,
        }
    };
}

impl HydraulicProfile for Profile {
    fn height(&self) -> f64 {
        dispatch!(self, p => p.height())
    }

    fn total_area(&self) -> f64 {
        dispatch!(self, p => p.total_area())
    }

    fn flow_area(&self, h: f64) -> f64 {
        dispatch!(self, p => p.flow_area(h))
    }

    fn wetted_perimeter(&self, h: f64) -> f64 {
        dispatch!(self, p => p.wetted_perimeter(h))
    }

    fn hydraulic_radius(&self, h: f64) -> f64 {
        dispatch!(self, p => p.hydraulic_radius(h))
    }

    fn top_width(&self, h: f64) -> f64 {
        dispatch!(self, p => p.top_width(h))
    }

    fn water_level_by_flow_area(&self, area: f64) -> f64 {
        dispatch!(self, p => p.water_level_by_flow_area(area))
    }
}

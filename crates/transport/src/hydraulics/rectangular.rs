use serde::{Deserialize, Serialize};

use super::HydraulicProfile;

/// Closed rectangular conduit of inner `width` x `height`.
///
/// Linear in the water level, so the inverse needs no iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectangularProfile {
    width: f64,
    height: f64,
}

impl RectangularProfile {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    fn clamp_level(&self, h: f64) -> f64 {
        h.clamp(0.0, self.height)
    }
}

impl HydraulicProfile for RectangularProfile {
    fn height(&self) -> f64 {
        self.height
    }

    fn total_area(&self) -> f64 {
        self.width * self.height
    }

    fn flow_area(&self, h: f64) -> f64 {
        self.width * self.clamp_level(h)
    }

    fn wetted_perimeter(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        if h >= self.height {
            return 2.0 * (self.width + self.height);
        }
        self.width + 2.0 * h
    }

    fn hydraulic_radius(&self, h: f64) -> f64 {
        let perimeter = self.wetted_perimeter(h);
        if perimeter <= 0.0 {
            return 0.0;
        }
        self.flow_area(h) / perimeter
    }

    fn top_width(&self, h: f64) -> f64 {
        if h <= 0.0 || h >= self.height {
            0.0
        } else {
            self.width
        }
    }

    fn water_level_by_flow_area(&self, area: f64) -> f64 {
        (area / self.width).clamp(0.0, self.height)
    }
}

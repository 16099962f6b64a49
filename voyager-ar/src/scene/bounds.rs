use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in scene units.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self {
            min: Vec3::splat(-0.5),
            max: Vec3::splat(0.5),
        }
    }
}

impl SceneBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around the box centre.
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    /// Half-diagonal of the horizontal footprint.
    pub fn footprint_radius(&self) -> f32 {
        let size = self.size();
        Vec2::new(size.x, size.z).length() * 0.5
    }

    pub fn is_empty(&self) -> bool {
        let size = self.size();
        !(size.x > 0.0 || size.y > 0.0 || size.z > 0.0) || !size.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_corners() {
        let bounds = SceneBounds::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 1.0));
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, 1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.center(), Vec3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_radius_and_footprint() {
        let bounds = SceneBounds::new(Vec3::new(-3.0, 0.0, -4.0), Vec3::new(3.0, 1.0, 4.0));
        assert!((bounds.footprint_radius() - 5.0).abs() < 1e-5);
        assert!(bounds.radius() > bounds.footprint_radius());
    }

    #[test]
    fn test_degenerate_bounds_are_empty() {
        assert!(SceneBounds::new(Vec3::ZERO, Vec3::ZERO).is_empty());
        assert!(!SceneBounds::default().is_empty());
    }
}

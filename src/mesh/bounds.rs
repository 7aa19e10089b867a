//! Axis-aligned bounding boxes

use glam::DVec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    /// Smallest box containing every point; `None` for an empty set
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a DVec3>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |bounds, &p| Self {
            min: bounds.min.min(p),
            max: bounds.max.max(p),
        }))
    }

    /// Size along each axis
    #[must_use]
    pub fn extents(&self) -> DVec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Largest of the three extents
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.extents().max_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_of_points() {
        let points = [
            DVec3::new(-1.0, 2.0, 0.5),
            DVec3::new(3.0, -2.0, 0.0),
            DVec3::new(0.0, 0.0, 4.0),
        ];
        let bounds = BoundingBox::from_points(&points).unwrap();

        assert_eq!(bounds.min, DVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, DVec3::new(3.0, 2.0, 4.0));
        assert_eq!(bounds.extents(), DVec3::new(4.0, 4.0, 4.0));
        assert_eq!(bounds.center(), DVec3::new(1.0, 0.0, 2.0));
        assert_relative_eq!(bounds.max_extent(), 4.0);
    }

    #[test]
    fn test_empty_point_set() {
        assert!(BoundingBox::from_points(&Vec::<DVec3>::new()).is_none());
    }

    #[test]
    fn test_single_point_has_zero_extent() {
        let bounds = BoundingBox::from_points(&[DVec3::ONE]).unwrap();
        assert_eq!(bounds.max_extent(), 0.0);
    }
}

//! Circular fallback mask, used when every other cascade method fails

use crate::types::Mask;

/// Centred disc of radius `min(width, height) / divisor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularFallback {
    divisor: u32,
}

impl CircularFallback {
    pub const DEFAULT_DIVISOR: u32 = 3;

    /// A zero divisor is treated as 1
    #[must_use]
    pub fn new(divisor: u32) -> Self {
        Self {
            divisor: divisor.max(1),
        }
    }

    #[must_use]
    pub fn radius(&self, width: u32, height: u32) -> u32 {
        width.min(height) / self.divisor
    }

    /// Infallible: always yields a mask of the requested size
    #[must_use]
    pub fn mask(&self, width: u32, height: u32) -> Mask {
        let radius = i64::from(self.radius(width, height));
        let (cx, cy) = (i64::from(width / 2), i64::from(height / 2));
        Mask::from_fn(width, height, |x, y| {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            dx * dx + dy * dy <= radius * radius
        })
    }
}

impl Default for CircularFallback {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIVISOR)
    }
}

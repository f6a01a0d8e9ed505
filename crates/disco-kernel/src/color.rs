//! RGB color values and component-wise averaging.

use serde::{Deserialize, Serialize};

/// An immutable RGB triple with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    /// Create a color from three channel values.
    ///
    /// Channels outside `[0, 1]` are clamped rather than rejected; averaging
    /// and uniform sampling can only produce in-range values, so clamping
    /// only matters for embedder-supplied seeds.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Component-wise mean of a set of colors.
    ///
    /// Returns `None` for an empty set. The result does not depend on
    /// iteration order beyond floating-point rounding.
    pub fn average(colors: impl IntoIterator<Item = Color>) -> Option<Color> {
        let mut sum = (0.0, 0.0, 0.0);
        let mut count = 0usize;
        for color in colors {
            sum.0 += color.r;
            sum.1 += color.g;
            sum.2 += color.b;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Color::new(sum.0 / n, sum.1 / n, sum.2 / n))
    }
}

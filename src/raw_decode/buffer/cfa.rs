/// Colour of a single CFA site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfaColor {
    Red,
    Green,
    Blue,
    /// Second green site of patterns that distinguish the two greens.
    Green2,
}

/// Repeating colour filter pattern over the sensor.
///
/// The pattern origin is mutable so crops at odd offsets can realign it
/// via [`CfaPattern::shift_left`] and [`CfaPattern::shift_down`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaPattern {
    width: usize,
    height: usize,
    colors: Vec<CfaColor>,
}

impl CfaPattern {
    /// A pattern of `width * height` colours in row-major order.
    ///
    /// Empty patterns are normalised to the standard 2x2 RGGB layout.
    pub fn new(width: usize, height: usize, colors: Vec<CfaColor>) -> Self {
        if width == 0 || height == 0 || colors.len() != width * height {
            return Self::rggb();
        }
        Self {
            width,
            height,
            colors,
        }
    }

    pub fn rggb() -> Self {
        Self {
            width: 2,
            height: 2,
            colors: vec![
                CfaColor::Red,
                CfaColor::Green,
                CfaColor::Green,
                CfaColor::Blue,
            ],
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Colour at absolute sensor position `(x, y)`.
    pub fn color_at(&self, x: usize, y: usize) -> CfaColor {
        self.colors[(y % self.height) * self.width + (x % self.width)]
    }

    /// Move the pattern origin one column right: after cropping at an odd
    /// x offset, `color_at(0, y)` must report what used to sit at `(1, y)`.
    pub fn shift_left(&mut self) {
        for row in self.colors.chunks_exact_mut(self.width) {
            row.rotate_left(1);
        }
    }

    /// Move the pattern origin one row down.
    pub fn shift_down(&mut self) {
        self.colors.rotate_left(self.width);
    }
}

impl Default for CfaPattern {
    fn default() -> Self {
        Self::rggb()
    }
}

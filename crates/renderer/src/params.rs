use std::fmt;
use std::str::FromStr;

/// One of the four user-controlled scalar parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterAxis {
    X,
    Y,
    Z,
    W,
}

impl ParameterAxis {
    pub const ALL: [ParameterAxis; 4] = [
        ParameterAxis::X,
        ParameterAxis::Y,
        ParameterAxis::Z,
        ParameterAxis::W,
    ];

    /// Component index inside the `userParam` vector.
    pub fn index(self) -> usize {
        match self {
            ParameterAxis::X => 0,
            ParameterAxis::Y => 1,
            ParameterAxis::Z => 2,
            ParameterAxis::W => 3,
        }
    }
}

impl fmt::Display for ParameterAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterAxis::X => f.write_str("x"),
            ParameterAxis::Y => f.write_str("y"),
            ParameterAxis::Z => f.write_str("z"),
            ParameterAxis::W => f.write_str("w"),
        }
    }
}

impl FromStr for ParameterAxis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "x" | "0" => Ok(ParameterAxis::X),
            "y" | "1" => Ok(ParameterAxis::Y),
            "z" | "2" => Ok(ParameterAxis::Z),
            "w" | "3" => Ok(ParameterAxis::W),
            other => Err(format!(
                "unknown parameter '{other}'; expected x, y, z, or w"
            )),
        }
    }
}

/// The four live parameters fed to the `userParam` uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl ParameterVector {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn get(&self, axis: ParameterAxis) -> f32 {
        match axis {
            ParameterAxis::X => self.x,
            ParameterAxis::Y => self.y,
            ParameterAxis::Z => self.z,
            ParameterAxis::W => self.w,
        }
    }

    pub fn set(&mut self, axis: ParameterAxis, value: f32) {
        match axis {
            ParameterAxis::X => self.x = value,
            ParameterAxis::Y => self.y = value,
            ParameterAxis::Z => self.z = value,
            ParameterAxis::W => self.w = value,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

/// Size of the presentation surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn to_array(self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Live parameter cells plus the viewport observed on the latest tick.
///
/// Writes are stored verbatim. The render loop reads a [`ParameterVector`]
/// snapshot once per tick; since input handling and ticks share one
/// cooperative queue, a snapshot never observes a half-applied update.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: ParameterVector,
    viewport: ViewportSize,
}

impl ParameterStore {
    pub fn new(initial: ParameterVector) -> Self {
        Self {
            values: initial,
            viewport: ViewportSize::default(),
        }
    }

    pub fn set(&mut self, axis: ParameterAxis, value: f32) {
        self.values.set(axis, value);
    }

    pub fn get(&self, axis: ParameterAxis) -> f32 {
        self.values.get(axis)
    }

    pub fn snapshot(&self) -> ParameterVector {
        self.values
    }

    pub(crate) fn observe_viewport(&mut self, size: ViewportSize) {
        self.viewport = size;
    }

    /// Viewport reported by the surface on the most recent tick.
    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_unit_w() {
        let store = ParameterStore::default();
        assert_eq!(store.snapshot(), ParameterVector::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn stores_values_bit_for_bit() {
        let mut store = ParameterStore::default();
        let samples = [
            0.1_f32,
            -0.0,
            f32::MAX,
            f32::MIN_POSITIVE / 4.0,
            f32::INFINITY,
            f32::NAN,
            1234.5678,
        ];
        for value in samples {
            store.set(ParameterAxis::X, value);
            assert_eq!(store.snapshot().x.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn axes_are_independent() {
        let mut store = ParameterStore::default();
        store.set(ParameterAxis::Z, 3.0);
        store.set(ParameterAxis::Y, -2.0);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.to_array(), [0.0, -2.0, 3.0, 1.0]);
    }

    #[test]
    fn parses_axis_names() {
        assert_eq!("W".parse::<ParameterAxis>().unwrap(), ParameterAxis::W);
        assert_eq!("2".parse::<ParameterAxis>().unwrap(), ParameterAxis::Z);
        assert!("q".parse::<ParameterAxis>().is_err());
    }
}

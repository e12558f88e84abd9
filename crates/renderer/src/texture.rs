use std::fmt;
use std::str::FromStr;

use image::imageops::flip_vertical_in_place;
use image::DynamicImage;

use crate::backend::{GraphicsBackend, TextureId};

/// Sampling behaviour outside the `[0, 1]` texture coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    /// Maps a UI selector index onto a wrap mode; unknown indices fall back to `Repeat`.
    pub fn from_selector(selector: i64) -> Self {
        match selector {
            1 => WrapMode::ClampToEdge,
            2 => WrapMode::MirroredRepeat,
            _ => WrapMode::Repeat,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            WrapMode::Repeat => 0,
            WrapMode::ClampToEdge => 1,
            WrapMode::MirroredRepeat => 2,
        }
    }

    /// Next mode in selector order, wrapping around.
    pub fn cycle(self) -> Self {
        Self::from_selector(i64::from(self.selector()) + 1)
    }
}

impl fmt::Display for WrapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapMode::Repeat => f.write_str("repeat"),
            WrapMode::ClampToEdge => f.write_str("clamp"),
            WrapMode::MirroredRepeat => f.write_str("mirror"),
        }
    }
}

impl FromStr for WrapMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if let Ok(selector) = normalized.parse::<i64>() {
            return Ok(WrapMode::from_selector(selector));
        }
        match normalized.as_str() {
            "repeat" => Ok(WrapMode::Repeat),
            "clamp" | "clamp-to-edge" | "clamp_to_edge" => Ok(WrapMode::ClampToEdge),
            "mirror" | "mirrored-repeat" | "mirrored_repeat" => Ok(WrapMode::MirroredRepeat),
            other => Err(format!(
                "unknown wrap mode '{other}'; expected repeat, clamp, mirror, or 0/1/2"
            )),
        }
    }
}

/// Texture axis a wrap mode applies to (`S`/`U` is X, `T`/`V` is Y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAxis {
    X,
    Y,
}

impl fmt::Display for TextureAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureAxis::X => f.write_str("x"),
            TextureAxis::Y => f.write_str("y"),
        }
    }
}

impl FromStr for TextureAxis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "x" | "s" | "u" => Ok(TextureAxis::X),
            "y" | "t" | "v" => Ok(TextureAxis::Y),
            other => Err(format!("unknown texture axis '{other}'; expected x or y")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureError {
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("expected {expected} bytes of RGBA8 data for a {width}x{height} image, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("image is {width}x{height} but the GPU accepts at most {max}x{max}")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Owns the single user image texture and its desired wrap state.
#[derive(Debug)]
pub struct TextureManager {
    handle: TextureId,
    width: u32,
    height: u32,
    wrap_x: WrapMode,
    wrap_y: WrapMode,
}

impl TextureManager {
    /// Uploads decoded RGBA8 pixels once; the texture lives as long as the manager.
    pub fn upload<B: GraphicsBackend>(
        backend: &mut B,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        let max = backend.max_texture_dimension();
        if width > max || height > max {
            return Err(TextureError::TooLarge { width, height, max });
        }

        let handle = backend.create_texture(pixels, width, height);
        tracing::debug!(%handle, width, height, "uploaded sandbox image");
        let manager = Self {
            handle,
            width,
            height,
            wrap_x: WrapMode::default(),
            wrap_y: WrapMode::default(),
        };
        manager.apply_wrap_mode(backend);
        Ok(manager)
    }

    /// Converts a decoded image to RGBA8, flips it so row zero is the bottom
    /// edge (texture coordinate `v = 0`), and uploads it.
    pub fn from_image<B: GraphicsBackend>(
        backend: &mut B,
        image: &DynamicImage,
    ) -> Result<Self, TextureError> {
        let mut rgba = image.to_rgba8();
        flip_vertical_in_place(&mut rgba);
        let (width, height) = rgba.dimensions();
        Self::upload(backend, rgba.as_raw(), width, height)
    }

    pub fn handle(&self) -> TextureId {
        self.handle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_wrap_mode(&mut self, axis: TextureAxis, mode: WrapMode) {
        match axis {
            TextureAxis::X => self.wrap_x = mode,
            TextureAxis::Y => self.wrap_y = mode,
        }
    }

    pub fn wrap_mode(&self, axis: TextureAxis) -> WrapMode {
        match axis {
            TextureAxis::X => self.wrap_x,
            TextureAxis::Y => self.wrap_y,
        }
    }

    /// Pushes the recorded wrap modes to the GPU texture. Safe to call every frame.
    pub fn apply_wrap_mode<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.set_texture_wrap(self.handle, self.wrap_x, self.wrap_y);
    }

    /// Binds the texture for the next draw and re-applies its wrap state.
    pub fn bind<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.bind_texture(self.handle);
        self.apply_wrap_mode(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeBackend};
    use image::{Rgba, RgbaImage};

    #[test]
    fn selector_mapping_defaults_to_repeat() {
        assert_eq!(WrapMode::from_selector(0), WrapMode::Repeat);
        assert_eq!(WrapMode::from_selector(1), WrapMode::ClampToEdge);
        assert_eq!(WrapMode::from_selector(2), WrapMode::MirroredRepeat);
        for other in [-1, 3, 42, i64::MAX, i64::MIN] {
            assert_eq!(WrapMode::from_selector(other), WrapMode::Repeat);
        }
    }

    #[test]
    fn parses_names_and_selectors() {
        assert_eq!("clamp".parse::<WrapMode>().unwrap(), WrapMode::ClampToEdge);
        assert_eq!("Mirror".parse::<WrapMode>().unwrap(), WrapMode::MirroredRepeat);
        assert_eq!("2".parse::<WrapMode>().unwrap(), WrapMode::MirroredRepeat);
        assert_eq!("9".parse::<WrapMode>().unwrap(), WrapMode::Repeat);
        assert!("wobble".parse::<WrapMode>().is_err());
    }

    #[test]
    fn cycle_visits_every_mode() {
        let start = WrapMode::Repeat;
        assert_eq!(start.cycle(), WrapMode::ClampToEdge);
        assert_eq!(start.cycle().cycle(), WrapMode::MirroredRepeat);
        assert_eq!(start.cycle().cycle().cycle(), WrapMode::Repeat);
    }

    #[test]
    fn rejects_mis_sized_pixel_data() {
        let mut backend = FakeBackend::default();
        let err = TextureManager::upload(&mut backend, &[0u8; 12], 2, 2).unwrap_err();
        assert!(matches!(err, TextureError::SizeMismatch { expected: 16, .. }));
        let err = TextureManager::upload(&mut backend, &[], 0, 4).unwrap_err();
        assert!(matches!(err, TextureError::EmptyImage { .. }));
        assert!(backend.textures.is_empty());
    }

    #[test]
    fn rejects_images_beyond_the_device_limit() {
        let mut backend = FakeBackend::default();
        backend.max_texture_dimension = 2;

        let err = TextureManager::upload(&mut backend, &[0u8; 12], 3, 1).unwrap_err();
        assert_eq!(
            err,
            TextureError::TooLarge {
                width: 3,
                height: 1,
                max: 2
            }
        );
        assert!(backend.textures.is_empty());

        let texture = TextureManager::upload(&mut backend, &[0u8; 16], 2, 2).unwrap();
        assert_eq!(texture.dimensions(), (2, 2));
    }

    #[test]
    fn wrap_mode_is_reapplied_on_every_bind() {
        let mut backend = FakeBackend::default();
        let mut texture = TextureManager::upload(&mut backend, &[255u8; 16], 2, 2).unwrap();
        texture.set_wrap_mode(TextureAxis::Y, WrapMode::MirroredRepeat);
        backend.calls.clear();

        texture.bind(&mut backend);
        texture.bind(&mut backend);

        let wraps = backend
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::SetTextureWrap(_, WrapMode::Repeat, WrapMode::MirroredRepeat)
                )
            })
            .count();
        assert_eq!(wraps, 2);
        assert_eq!(
            backend.textures[&texture.handle().raw()].wrap,
            (WrapMode::Repeat, WrapMode::MirroredRepeat)
        );
    }

    #[test]
    fn from_image_flips_rows() {
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        let mut backend = FakeBackend::default();

        let texture =
            TextureManager::from_image(&mut backend, &DynamicImage::ImageRgba8(image)).unwrap();

        let stored = &backend.textures[&texture.handle().raw()];
        assert_eq!((stored.width, stored.height), (1, 2));
        assert_eq!(&stored.pixels[..4], &[0, 0, 255, 255]);
        assert_eq!(&stored.pixels[4..], &[255, 0, 0, 255]);
        assert_eq!(texture.dimensions(), (1, 2));
    }
}

//! CPU-side RGBA8 images and texture loading.

use crate::coords::Extent;

use super::backend::{GfxBackend, TextureDesc, TextureFilter};
use super::error::GfxError;
use super::resource::{ResourceGroup, Texture};
use super::Renderer;

/// Tightly packed RGBA8 pixels, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRgba8 {
    pub size: Extent,
    pub pixels: Vec<u8>,
}

impl ImageRgba8 {
    /// Fully transparent image.
    pub fn new(size: Extent) -> Self {
        Self { size, pixels: vec![0; size.area() as usize * 4] }
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(size: Extent, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(size.area() as usize * 4);
        for y in 0..size.height {
            for x in 0..size.width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self { size, pixels }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(px)
    }
}

/// Decodes PNG bytes into RGBA8.
pub fn decode_rgba8(bytes: &[u8]) -> Result<ImageRgba8, GfxError> {
    let img = ::image::load_from_memory(bytes).map_err(|e| GfxError::Image(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(ImageRgba8 { size: Extent::new(width, height), pixels: rgba.into_raw() })
}

impl<B: GfxBackend> Renderer<B> {
    /// Uploads `image` as an sRGB color texture.
    pub fn upload_image(
        &mut self,
        group: &mut ResourceGroup,
        image: &ImageRgba8,
        filter: TextureFilter,
    ) -> Result<Texture, GfxError> {
        let desc = TextureDesc::new(image.size).with_filter(filter);
        self.create_texture(group, desc, &image.pixels)
    }

    /// Decodes PNG bytes and uploads them with linear filtering.
    pub fn load_texture(
        &mut self,
        group: &mut ResourceGroup,
        bytes: &[u8],
    ) -> Result<Texture, GfxError> {
        let image = decode_rgba8(bytes)?;
        log::debug!("texture decoded: {}x{}", image.size.width, image.size.height);
        self.upload_image(group, &image, TextureFilter::Linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{BackendCall, RecordingBackend};
    use crate::gfx::RendererConfig;
    use ::image::ImageEncoder;

    fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ::image::codecs::png::PngEncoder::new(&mut out)
            .write_image(rgba, width, height, ::image::ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    #[test]
    fn decodes_png_pixels() {
        let rgba = [255, 0, 0, 255, 0, 255, 0, 128];
        let img = decode_rgba8(&encode_png(2, 1, &rgba)).unwrap();
        assert_eq!(img.size, Extent::new(2, 1));
        assert_eq!(img.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(1, 0), Some([0, 255, 0, 128]));
        assert_eq!(img.pixel(2, 0), None);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert!(matches!(decode_rgba8(b"definitely not a png"), Err(GfxError::Image(_))));
    }

    #[test]
    fn from_fn_fills_row_major() {
        let img = ImageRgba8::from_fn(Extent::new(2, 2), |x, y| [x as u8, y as u8, 0, 255]);
        assert_eq!(img.pixel(1, 0), Some([1, 0, 0, 255]));
        assert_eq!(img.pixel(0, 1), Some([0, 1, 0, 255]));
    }

    #[test]
    fn load_texture_uploads_into_group() {
        let mut r = Renderer::startup(RecordingBackend::new(), RendererConfig::default()).unwrap();
        let mut group = ResourceGroup::new("textures");

        let tex = r.load_texture(&mut group, &encode_png(1, 1, &[1, 2, 3, 4])).unwrap();

        assert_eq!(tex.size(), Extent::new(1, 1));
        assert_eq!(group.len(), 1);
        assert!(r.backend().calls().iter().any(|c| matches!(
            c,
            BackendCall::CreateTexture { texture, .. } if *texture == tex.handle()
        )));

        r.destroy_group(&mut group);
        r.shutdown();
    }
}

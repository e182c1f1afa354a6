use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use ndarray::Array4;
use std::io::Cursor;

/// Side length of the square the classifier was trained on.
pub const INPUT_SIZE: u32 = 30;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("{0}")]
    Read(#[from] std::io::Error),
}

/// Decodes an uploaded image, guessing the format from its content, and drops any alpha.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image.to_rgb8())
}

/// Builds the `[1, H, W, C]` input tensor with pixel values scaled to `[0, 1]`.
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
    let side = INPUT_SIZE as usize;

    let mut tensor = Array4::<f32>::zeros((1, side, side, CHANNELS));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..CHANNELS {
            tensor[[0, y as usize, x as usize, channel]] = pixel[channel] as f32 / 255.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, Rgba, RgbaImage};

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn decodes_and_drops_alpha() {
        let source = RgbaImage::from_pixel(12, 7, Rgba([10, 20, 30, 128]));
        let decoded = decode_image(&encode(&source, ImageFormat::Png)).unwrap();
        assert_eq!(decoded.dimensions(), (12, 7));
        assert_eq!(decoded.get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn rejects_bytes_that_are_not_an_image() {
        let result = decode_image(b"this is plainly not an image");
        assert!(result.is_err());
    }

    #[test]
    fn tensor_has_batch_dimension_and_unit_range() {
        let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 255]));
        let tensor = preprocess(&image);

        assert_eq!(tensor.shape(), &[1, 30, 30, 3]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(tensor.iter().any(|v| *v > 0.99));
    }

    #[test]
    fn solid_colour_survives_resizing() {
        let image = RgbImage::from_pixel(100, 100, Rgb([255, 0, 51]));
        let tensor = preprocess(&image);

        let step = 1.0 / 255.0 + 1e-6;
        assert!((tensor[[0, 15, 15, 0]] - 1.0).abs() <= step);
        assert!(tensor[[0, 15, 15, 1]].abs() <= step);
        assert!((tensor[[0, 15, 15, 2]] - 0.2).abs() <= step);
    }
}

//! Superpixel segmentation raster.
//!
//! A segmentation maps every pixel of one image to a superpixel region
//! index. The server delivers it as an RGB-encoded label image where
//! `index = r + 256 * g + 65536 * b`, decoded here into a dense label
//! array for pointer hit-testing.

use image::RgbImage;
use ndarray::Array2;

use crate::error::EngineError;
use crate::viewport::PixelCoord;

/// Integer id of one segmentation region, in `[0, max_index)`.
pub type SuperpixelIndex = usize;

/// Per-pixel superpixel labels for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    // (rows, cols) = (height, width)
    labels: Array2<u32>,
    max_index: usize,
}

impl Segmentation {
    /// Create a segmentation from a dense label raster.
    ///
    /// `max_index` becomes the highest label plus one; region labels need
    /// not be contiguous.
    pub fn new(labels: Array2<u32>) -> Result<Self, EngineError> {
        if labels.is_empty() {
            return Err(EngineError::invalid_input("empty superpixel raster"));
        }
        let max_label = labels.iter().copied().max().unwrap_or(0);
        Ok(Self {
            labels,
            max_index: max_label as usize + 1,
        })
    }

    /// Decode an RGB-encoded label image (`index = r + 256g + 65536b`).
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self, EngineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::protocol("empty superpixel raster"));
        }
        let labels = Array2::from_shape_fn(
            (image.height() as usize, image.width() as usize),
            |(y, x)| {
                let p = image.get_pixel(x as u32, y as u32);
                u32::from(p[0]) + 256 * u32::from(p[1]) + 65536 * u32::from(p[2])
            },
        );
        Self::new(labels)
    }

    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    /// Number of addressable regions; every label is below this.
    pub fn region_count(&self) -> usize {
        self.max_index
    }

    /// Region index under an image pixel coordinate, or `None` when the
    /// coordinate falls outside the raster.
    pub fn label_at(&self, pixel: PixelCoord) -> Option<SuperpixelIndex> {
        if pixel.x < 0.0 || pixel.y < 0.0 {
            return None;
        }
        let (x, y) = (pixel.x.floor() as usize, pixel.y.floor() as usize);
        self.labels.get((y, x)).map(|&label| label as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_labels(w: usize, h: usize, cell: usize) -> Array2<u32> {
        let cols = w.div_ceil(cell);
        Array2::from_shape_fn((h, w), |(y, x)| ((y / cell) * cols + (x / cell)) as u32)
    }

    #[test]
    fn test_region_count_from_max_label() {
        let seg = Segmentation::new(grid_labels(8, 8, 4)).unwrap();
        assert_eq!(seg.region_count(), 4);
        assert_eq!(seg.width(), 8);
        assert_eq!(seg.height(), 8);
    }

    #[test]
    fn test_empty_raster_rejected() {
        assert!(Segmentation::new(Array2::zeros((0, 0))).is_err());
    }

    #[test]
    fn test_label_at_cells() {
        let seg = Segmentation::new(grid_labels(8, 8, 4)).unwrap();
        assert_eq!(seg.label_at(PixelCoord::new(0.0, 0.0)), Some(0));
        assert_eq!(seg.label_at(PixelCoord::new(7.9, 0.5)), Some(1));
        assert_eq!(seg.label_at(PixelCoord::new(1.0, 6.0)), Some(2));
        assert_eq!(seg.label_at(PixelCoord::new(5.0, 5.0)), Some(3));
    }

    #[test]
    fn test_label_at_outside_raster() {
        let seg = Segmentation::new(grid_labels(8, 8, 4)).unwrap();
        assert_eq!(seg.label_at(PixelCoord::new(-0.1, 0.0)), None);
        assert_eq!(seg.label_at(PixelCoord::new(8.0, 0.0)), None);
        assert_eq!(seg.label_at(PixelCoord::new(3.0, 9.0)), None);
    }

    #[test]
    fn test_rgb_decode() {
        // index = r + 256g + 65536b
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([7, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([1, 2, 3]));

        let seg = Segmentation::from_rgb_image(&img).unwrap();
        assert_eq!(seg.label_at(PixelCoord::new(0.0, 0.0)), Some(7));
        assert_eq!(
            seg.label_at(PixelCoord::new(1.0, 0.0)),
            Some(1 + 256 * 2 + 65536 * 3)
        );
        assert_eq!(seg.region_count(), 1 + 256 * 2 + 65536 * 3 + 1);
    }
}

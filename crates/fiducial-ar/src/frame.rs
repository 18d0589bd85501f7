//! Owned color frames as they travel from a source through the pipeline to a sink.

use fiducial_ar_core::{GrayImage, ImageSize};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma, Rgb as RgbPixel, RgbImage};
use serde::{Deserialize, Serialize};

/// Channel layout of a [`Frame`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    Rgb8,
    Bgr8,
    Gray8,
}

impl ColorSpace {
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ColorSpace::Rgb8 | ColorSpace::Bgr8 => 3,
            ColorSpace::Gray8 => 1,
        }
    }
}

/// A drawing color, always given as red, green, blue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const RED: Rgb = Rgb([255, 0, 0]);
    pub const GREEN: Rgb = Rgb([0, 255, 0]);
    pub const BLUE: Rgb = Rgb([0, 0, 255]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// ITU-R BT.601 luma.
    #[inline]
    pub fn luma(self) -> u8 {
        let [r, g, b] = self.0.map(u32::from);
        ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero (got {width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BufferSize { expected: usize, got: usize },
}

/// One image of the stream, row-major and tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width as usize * height as usize * color_space.channels();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            color_space,
            data,
        })
    }

    /// Frame of a single color.
    pub fn filled(width: u32, height: u32, color_space: ColorSpace, color: Rgb) -> Self {
        let px = encode(color_space, color);
        let data = px[..color_space.channels()]
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * color_space.channels())
            .collect();
        Self {
            width,
            height,
            color_space,
            data,
        }
    }

    /// Wrap a decoded image. 8-bit luma stays grayscale, everything else is
    /// converted to RGB.
    pub fn from_image(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Self {
                width: gray.width(),
                height: gray.height(),
                color_space: ColorSpace::Gray8,
                data: gray.into_raw(),
            },
            other => {
                let rgb = other.to_rgb8();
                Self {
                    width: rgb.width(),
                    height: rgb.height(),
                    color_space: ColorSpace::Rgb8,
                    data: rgb.into_raw(),
                }
            }
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    #[inline]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grayscale copy for the vision toolkit.
    pub fn to_gray(&self) -> GrayImage {
        let data = match self.color_space {
            ColorSpace::Gray8 => self.data.clone(),
            ColorSpace::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|c| Rgb([c[0], c[1], c[2]]).luma())
                .collect(),
            ColorSpace::Bgr8 => self
                .data
                .chunks_exact(3)
                .map(|c| Rgb([c[2], c[1], c[0]]).luma())
                .collect(),
        };
        GrayImage {
            width: self.width as usize,
            height: self.height as usize,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let n = self.color_space.channels();
        let i = (y as usize * self.width as usize + x as usize) * n;
        let p = &self.data[i..i + n];
        Some(match self.color_space {
            ColorSpace::Rgb8 => Rgb([p[0], p[1], p[2]]),
            ColorSpace::Bgr8 => Rgb([p[2], p[1], p[0]]),
            ColorSpace::Gray8 => Rgb([p[0]; 3]),
        })
    }

    /// Write one pixel; coordinates outside the frame are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let n = self.color_space.channels();
        let i = (y as usize * self.width as usize + x as usize) * n;
        let px = encode(self.color_space, color);
        self.data[i..i + n].copy_from_slice(&px[..n]);
    }

    /// RGB copy, e.g. for writing to disk.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        for (x, y, px) in out.enumerate_pixels_mut() {
            let c = self.pixel(x, y).unwrap_or(Rgb::BLACK);
            *px = RgbPixel(c.0);
        }
        out
    }

    /// Downscale so the larger side is at most `max_side`; smaller frames are
    /// returned unchanged.
    pub fn scaled_to_max_side(&self, max_side: u32) -> Frame {
        let longest = self.width.max(self.height);
        if max_side == 0 || longest <= max_side {
            return self.clone();
        }
        let scale = max_side as f64 / longest as f64;
        let w = ((self.width as f64 * scale) as u32).max(1);
        let h = ((self.height as f64 * scale) as u32).max(1);

        // Channel order does not matter for resampling.
        let data = match self.color_space {
            ColorSpace::Gray8 => {
                ImageBuffer::<Luma<u8>, _>::from_raw(self.width, self.height, self.data.clone())
                    .map(|img| imageops::resize(&img, w, h, FilterType::Triangle).into_raw())
            }
            ColorSpace::Rgb8 | ColorSpace::Bgr8 => {
                ImageBuffer::<RgbPixel<u8>, _>::from_raw(self.width, self.height, self.data.clone())
                    .map(|img| imageops::resize(&img, w, h, FilterType::Triangle).into_raw())
            }
        };
        match data {
            Some(data) => Frame {
                width: w,
                height: h,
                color_space: self.color_space,
                data,
            },
            None => self.clone(),
        }
    }
}

fn encode(color_space: ColorSpace, color: Rgb) -> [u8; 3] {
    let [r, g, b] = color.0;
    match color_space {
        ColorSpace::Rgb8 => [r, g, b],
        ColorSpace::Bgr8 => [b, g, r],
        ColorSpace::Gray8 => [color.luma(), 0, 0],
    }
}

use super::OutputSink;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::format::Format;
use v4l::video::Output;
use v4l::{Device, FourCC};

/// Virtual camera fed through a v4l2loopback device
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        // Announce the frame geometry before any data is written
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let requested = Format::new(width, height, FourCC::new(b"YUYV"));
        let applied = Output::set_format(&device, &requested)
            .context("Failed to set YUYV output format")?;
        tracing::debug!("Loopback format: {}x{}", applied.width, applied.height);

        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        Ok(Self {
            file,
            width,
            height,
        })
    }
}

/// Pack RGB into YUV 4:2:2 (YUYV): full luma per pixel, chroma averaged over
/// each horizontal pair. An odd last column is paired with itself.
fn pack_yuyv(frame: &RgbImage) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let mut packed = Vec::with_capacity((width.div_ceil(2) * 4 * height) as usize);

    for row in frame.rows() {
        let pixels: Vec<&Rgb<u8>> = row.collect();
        for pair in pixels.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);

            let (y0, u0, v0) = full_range_ycbcr(left);
            let (y1, u1, v1) = full_range_ycbcr(right);

            packed.extend_from_slice(&[y0, midpoint(u0, u1), y1, midpoint(v0, v1)]);
        }
    }

    packed
}

/// BT.601 full-range YCbCr in 8.8 fixed point
fn full_range_ycbcr(pixel: &Rgb<u8>) -> (u8, u8, u8) {
    let [r, g, b] = pixel.0.map(i32::from);

    let y = (77 * r + 150 * g + 29 * b + 128) >> 8;
    let cb = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
    let cr = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;

    (saturate(y), saturate(cb), saturate(cr))
}

fn saturate(value: i32) -> u8 {
    value.clamp(0, i32::from(u8::MAX)) as u8
}

fn midpoint(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b)) / 2) as u8
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let frame = if frame.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        } else {
            frame.clone()
        };

        let yuyv_data = pack_yuyv(&frame);

        self.file
            .write_all(&yuyv_data)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_pack_into_four_bytes() {
        let frame = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        let packed = pack_yuyv(&frame);
        assert_eq!(packed.len(), 4 * 2 * 2);
        assert_eq!(&packed[..4], &[255, 128, 255, 128]);
    }

    #[test]
    fn odd_width_repeats_last_pixel() {
        let mut frame = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        frame.put_pixel(2, 0, Rgb([255, 255, 255]));
        let packed = pack_yuyv(&frame);
        assert_eq!(packed.len(), 8);
        assert_eq!(&packed[4..], &[255, 128, 255, 128]);
    }

    #[test]
    fn greys_have_neutral_chroma() {
        for level in [0u8, 64, 128, 200, 255] {
            let (y, cb, cr) = full_range_ycbcr(&Rgb([level, level, level]));
            assert_eq!(y, level);
            assert_eq!((cb, cr), (128, 128));
        }
    }

    #[test]
    fn pure_red_pushes_cr_up() {
        let (_, cb, cr) = full_range_ycbcr(&Rgb([255, 0, 0]));
        assert!(cr > 200);
        assert!(cb < 128);
    }
}

//! Camera buffer to RGB conversion.

use image::RgbImage;

use crate::error::TrackerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Nv12,
}

impl PixelFormat {
    /// Map a V4L2 fourcc to a supported format.
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"NV12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<RgbImage, TrackerError> {
    let rgb = match format {
        PixelFormat::Rgb24 => {
            let expected = expected_len(width, height, 3, 1)?;
            check_len("RGB", expected, pixels)?;
            pixels[..expected].to_vec()
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height)?,
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height)?,
    };
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| TrackerError::unavailable("RGB buffer does not match frame size"))
}

/// `width * height * num / den`, failing on overflow.
fn expected_len(width: u32, height: u32, num: usize, den: usize) -> Result<usize, TrackerError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(num))
        .map(|v| v / den)
        .ok_or_else(|| TrackerError::unavailable("frame dimensions overflow"))
}

// Drivers may pad buffers, so only a short buffer is an error.
fn check_len(label: &str, expected: usize, pixels: &[u8]) -> Result<(), TrackerError> {
    if pixels.len() < expected {
        return Err(TrackerError::unavailable(format!(
            "{} frame too short: expected {}, got {}",
            label,
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TrackerError> {
    let expected = expected_len(width, height, 2, 1)?;
    check_len("YUYV", expected, pixels)?;
    let w = width as usize;
    let h = height as usize;

    let mut rgb = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in 0..w {
            let pair = (j * w + (i & !1)) * 2;
            let y = pixels[(j * w + i) * 2] as f32;
            let u = pixels[pair + 1] as f32 - 128.0;
            let v = pixels[pair + 3] as f32 - 128.0;
            write_rgb(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TrackerError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = expected_len(width, height, 1, 1)?;
    let expected = expected_len(width, height, 3, 2)?;
    check_len("NV12", expected, pixels)?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            write_rgb(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }
    Ok(rgb)
}

fn write_rgb(out: &mut [u8], y: f32, u: f32, v: f32) {
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array2;

const RGB_TO_YCBCR: [[f64; 3]; 3] = [
    [0.299, 0.587, 0.114],
    [-0.1687, -0.3313, 0.5],
    [0.5, -0.4187, -0.0813],
];

const YCBCR_TO_RGB: [[f64; 3]; 3] = [
    [1.0, 0.0, 1.402],
    [1.0, -0.3441, -0.7141],
    [1.0, 1.772, 0.0],
];

/// Splits an RGB image into full-resolution Y, Cb and Cr planes (JFIF, chroma
/// offset by 128).
pub fn rgb_to_ycbcr(image: &RgbImage) -> [Array2<f64>; 3] {
    let (width, height) = image.dimensions();
    let mut planes = [
        Array2::zeros((height as usize, width as usize)),
        Array2::zeros((height as usize, width as usize)),
        Array2::zeros((height as usize, width as usize)),
    ];

    for (x, y, pixel) in image.enumerate_pixels() {
        let rgb = [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64];
        for (channel, row) in RGB_TO_YCBCR.iter().enumerate() {
            let offset = if channel == 0 { 0.0 } else { 128.0 };
            planes[channel][[y as usize, x as usize]] =
                row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2] + offset;
        }
    }

    planes
}

/// Inverse of [`rgb_to_ycbcr`]; values are clamped to `0..=255`.
pub fn ycbcr_to_rgb(y: &Array2<f64>, cb: &Array2<f64>, cr: &Array2<f64>) -> RgbImage {
    let (height, width) = y.dim();
    let mut image = RgbImage::new(width as u32, height as u32);

    for row in 0..height {
        for col in 0..width {
            let ycc = [y[[row, col]], cb[[row, col]] - 128.0, cr[[row, col]] - 128.0];
            let mut rgb = [0u8; 3];
            for (value, coeffs) in rgb.iter_mut().zip(YCBCR_TO_RGB.iter()) {
                let v = coeffs[0] * ycc[0] + coeffs[1] * ycc[1] + coeffs[2] * ycc[2];
                *value = v.round().clamp(0.0, 255.0) as u8;
            }
            image.put_pixel(col as u32, row as u32, Rgb(rgb));
        }
    }

    image
}

pub fn array_to_gray(arr: &Array2<f64>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut image = GrayImage::new(width as u32, height as u32);

    for y in 0..height {
        for x in 0..width {
            let value = arr[[y, x]].clamp(0.0, 255.0) as u8;
            image.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    image
}

pub fn normalize_to_u8(arr: &Array2<f64>) -> Array2<f64> {
    let min = arr.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !(range > 1e-10) {
        Array2::zeros(arr.dim())
    } else {
        arr.mapv(|v| ((v - min) / range) * 255.0)
    }
}

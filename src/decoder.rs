//! Boundary to the JPEG decoder that supplies quantized coefficients.

use ndarray::{Array3, Axis};

use crate::error::{ForensicsError, Result};

pub const LUMA: usize = 0;
pub const CB: usize = 1;
pub const CR: usize = 2;

/// Per-component view of a decoded JPEG. Component 0 is Y, 1 is Cb, 2 is Cr.
pub trait CoefficientDecoder {
    fn height_in_blocks(&self, component: usize) -> usize;

    fn width_in_blocks(&self, component: usize) -> usize;

    fn h_samp_factor(&self, component: usize) -> u8;

    fn v_samp_factor(&self, component: usize) -> u8;

    fn max_h_samp_factor(&self) -> u8;

    fn max_v_samp_factor(&self) -> u8;

    fn quantization_table(&self, component: usize) -> Result<[u16; 64]>;

    /// Quantized coefficients of shape `[V, H, 64]`, row-major within a block.
    fn dct_coefficients(&self, component: usize) -> Result<Array3<i16>>;
}

pub fn dequantize(raw: &Array3<i16>, table: &[u16; 64]) -> Result<Array3<f64>> {
    let (_, _, len) = raw.dim();
    if len != table.len() {
        return Err(ForensicsError::Shape(format!(
            "coefficient blocks of length {} cannot be dequantized with a table of {}",
            len,
            table.len()
        )));
    }

    let mut dequantized = raw.mapv(f64::from);
    for mut block in dequantized.lanes_mut(Axis(2)) {
        for (coefficient, &q) in block.iter_mut().zip(table.iter()) {
            *coefficient *= f64::from(q);
        }
    }

    Ok(dequantized)
}

pub fn table_as_f64(table: &[u16; 64]) -> [f64; 64] {
    table.map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequantize_broadcasts_over_blocks() {
        let raw = Array3::from_shape_fn((2, 3, 64), |(i, j, k)| (i + j + k) as i16 - 10);
        let mut table = [1u16; 64];
        table[0] = 16;
        table[63] = 99;

        let dequantized = dequantize(&raw, &table).unwrap();
        assert_eq!(dequantized[[1, 2, 0]], f64::from(raw[[1, 2, 0]]) * 16.0);
        assert_eq!(dequantized[[0, 1, 63]], f64::from(raw[[0, 1, 63]]) * 99.0);
        assert_eq!(dequantized[[0, 0, 5]], f64::from(raw[[0, 0, 5]]));
    }

    #[test]
    fn test_dequantize_rejects_short_blocks() {
        let raw = Array3::<i16>::zeros((1, 1, 16));
        assert!(dequantize(&raw, &[1; 64]).is_err());
    }
}

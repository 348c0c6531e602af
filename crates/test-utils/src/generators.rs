//! Band array generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable patterns so tests can
//! compute the expected colour of any pixel by hand.

/// Creates a band with every sample set to `value`.
///
/// # Example
///
/// ```
/// use test_utils::constant_band;
///
/// let band = constant_band(4, 3, 1500.0);
/// assert_eq!(band.len(), 12);
/// assert!(band.iter().all(|&v| v == 1500.0));
/// ```
pub fn constant_band(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a band rising linearly from `min` (first sample) to `max` (last sample).
///
/// # Example
///
/// ```
/// use test_utils::ramp_band;
///
/// let band = ramp_band(5, 1, 0.0, 100.0);
/// assert_eq!(band, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
/// ```
pub fn ramp_band(width: usize, height: usize, min: f32, max: f32) -> Vec<f32> {
    let n = width * height;
    if n <= 1 {
        return vec![min; n];
    }
    let step = (max - min) / (n - 1) as f32;
    (0..n).map(|i| min + step * i as f32).collect()
}

/// Creates a band from a row-major sequence of values, repeating it to fill.
///
/// Useful for reflectance bands where each pixel needs a distinct, known value.
pub fn pattern_band(width: usize, height: usize, pattern: &[f32]) -> Vec<f32> {
    if pattern.is_empty() {
        return vec![f32::NAN; width * height];
    }
    pattern.iter().copied().cycle().take(width * height).collect()
}

/// Creates a mask band of raw flag values, repeating `values` to fill.
///
/// # Example
///
/// ```
/// use test_utils::flag_band;
///
/// let band = flag_band(3, 1, &[0, 128]);
/// assert_eq!(band, vec![0.0, 128.0, 0.0]);
/// ```
pub fn flag_band(width: usize, height: usize, values: &[u32]) -> Vec<f32> {
    let pattern: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    pattern_band(width, height, &pattern)
}

/// Creates a band with NaN (no-data) at the given (col, row) positions.
///
/// All other samples are set to `fill`.
pub fn band_with_nans(
    width: usize,
    height: usize,
    fill: f32,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![fill; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Creates a reflectance pair whose normalised difference is `ndvi` everywhere.
///
/// Returns `(red, nir)` with `red + nir == 2000`.
pub fn ndvi_bands(width: usize, height: usize, ndvi: f32) -> (Vec<f32>, Vec<f32>) {
    let red = 1000.0 * (1.0 - ndvi);
    let nir = 1000.0 * (1.0 + ndvi);
    (
        constant_band(width, height, red),
        constant_band(width, height, nir),
    )
}

//! Temporal resampling of a band onto coarser, calendar-aware buckets
//!
//! The resampler streams the band through chunked time windows and keeps one
//! f64 running sum and sample count per (bucket, pixel), so precision does
//! not degrade over long series and memory stays bounded by the bucket count
//! rather than the raw time axis.

use crate::cube::{Band, RasterCube, SpatialGrid};
use crate::errors::{Nc2TifError, Result};
use crate::timeaxis::{assign_buckets, decode_time_axis, TimeResolution};
use chrono::NaiveDateTime;
use ndarray::Array3;

/// A band aggregated onto a coarser time axis by per-bucket means.
/// Constructed once per run and shared read-only across export workers.
pub struct ResampledSeries {
    pub band_name: String,
    pub resolution_label: String,
    /// Chronologically ordered bucket starts, one per output slice
    pub times: Vec<NaiveDateTime>,
    /// (bucket, y, x) means; all-missing buckets hold NaN slices
    pub data: Array3<f32>,
    pub grid: SpatialGrid,
}

impl ResampledSeries {
    pub fn num_buckets(&self) -> usize {
        self.times.len()
    }
}

/// Aggregates the band to the requested time resolution using per-bucket
/// arithmetic means over the time axis only; spatial axes are untouched.
///
/// Missing values (NaN and `_FillValue`) are skipped. A bucket with no valid
/// samples at a pixel yields NaN there, never an error.
///
/// # Errors
///
/// Returns an error if the resolution string does not parse, the time axis
/// cannot be decoded, or its length disagrees with the band shape.
pub fn resample_mean(
    cube: &RasterCube,
    band: &Band,
    time_resolution: &str,
) -> Result<ResampledSeries> {
    let resolution: TimeResolution = time_resolution.parse()?;

    let times = decode_time_axis(cube.file(), band.time_dim())?;
    if times.len() != band.num_time_steps() {
        return Err(Nc2TifError::Generic(format!(
            "time axis has {} entries but band '{}' has {} time steps",
            times.len(),
            band.name,
            band.num_time_steps()
        )));
    }

    let (bucket_starts, membership) = assign_buckets(&times, resolution);

    let [num_time, ny, nx] = band.shape;
    let num_buckets = bucket_starts.len();
    let slice_len = ny * nx;

    let mut sums = vec![0.0_f64; num_buckets * slice_len];
    let mut counts = vec![0_u32; num_buckets * slice_len];

    let mut t0 = 0;
    while t0 < num_time {
        let t1 = (t0 + cube.chunk_size()).min(num_time);
        let block = cube.read_time_chunk(band, t0, t1)?;

        for (offset, slice) in block.outer_iter().enumerate() {
            let base = membership[t0 + offset] * slice_len;
            for (i, &value) in slice.iter().enumerate() {
                if value.is_finite() {
                    sums[base + i] += f64::from(value);
                    counts[base + i] += 1;
                }
            }
        }

        t0 = t1;
    }

    let means: Vec<f32> = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| {
            if count > 0 {
                (sum / f64::from(count)) as f32
            } else {
                f32::NAN
            }
        })
        .collect();

    let data = Array3::from_shape_vec((num_buckets, ny, nx), means)?;
    let grid = cube.grid_for(band)?;

    Ok(ResampledSeries {
        band_name: band.name.clone(),
        resolution_label: time_resolution.to_string(),
        times: bucket_starts,
        data,
        grid,
    })
}

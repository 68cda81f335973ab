//! Per-slice GeoTIFF export and the parallel worker pool driving it
//!
//! Each time index of a [`ResampledSeries`] becomes one [`ExportTask`]: select
//! the slice, optionally clip it to the mask geometries, write one compressed
//! GeoTIFF. Tasks share the series and mask read-only and never target the
//! same output path, so the fan-out needs no coordination beyond a progress
//! counter; the first task error aborts the whole run.

use crate::cube::SpatialGrid;
use crate::errors::{Nc2TifError, Result};
use crate::mask::{Envelope, MaskGeometry};
use crate::resample::ResampledSeries;
use gdal::cpl::CslStringList;
use gdal::raster::{rasterize, Buffer};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Geometry;
use gdal::DriverManager;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use ndarray::s;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Explicit run configuration threaded through the exporter
/// (there is deliberately no global output-directory state)
pub struct ExportConfig {
    pub out_dir: PathBuf,
    pub num_workers: usize,
}

/// Output filename for one time bucket: `{resolution}__{YYYY-MM-DD}.tif`
/// inside the band's directory. Deterministic per (band, resolution, bucket),
/// so output is order-independent and re-runs are reproducible.
pub fn output_path(
    band_dir: &Path,
    resolution_label: &str,
    bucket_start: chrono::NaiveDateTime,
) -> PathBuf {
    band_dir.join(format!(
        "{}__{}.tif",
        resolution_label,
        bucket_start.format("%Y-%m-%d")
    ))
}

/// The unit of work handed to a worker: one time index of the series plus
/// shared read-only references. No task shares mutable state with another.
pub struct ExportTask<'a> {
    pub index: usize,
    pub series: &'a ResampledSeries,
    pub mask: Option<&'a MaskGeometry>,
    pub band_dir: &'a Path,
}

impl<'a> ExportTask<'a> {
    /// Writes the task's slice to its output file. Errors propagate to the
    /// pool controller; nothing is caught or retried here.
    pub fn run(&self) -> Result<()> {
        let grid = &self.series.grid;
        let geo_transform = grid.geo_transform()?;
        let projection = projection_wkt(grid)?;
        let path = output_path(
            self.band_dir,
            &self.series.resolution_label,
            self.series.times[self.index],
        );

        // Mask geometries live in EPSG:4326; windowing and burning happen in
        // the raster's own CRS, so reproject before either.
        let mask_geometries = match self.mask {
            Some(mask) => Some(mask.to_geometries_in(&projection)?),
            None => None,
        };

        let (c0, c1, r0, r1) = match &mask_geometries {
            Some((_, envelope)) => clip_window(grid, &geo_transform, *envelope, &path)?,
            None => (0, grid.width(), 0, grid.height()),
        };
        let (width, height) = (c1 - c0, r1 - r0);

        let mut values: Vec<f32> = self
            .series
            .data
            .slice(s![self.index, r0..r1, c0..c1])
            .iter()
            .copied()
            .collect();

        let window_transform = [
            geo_transform[0] + c0 as f64 * geo_transform[1],
            geo_transform[1],
            0.0,
            geo_transform[3] + r0 as f64 * geo_transform[5],
            0.0,
            geo_transform[5],
        ];

        if let Some((geometries, _)) = &mask_geometries {
            apply_mask(
                &mut values,
                width,
                height,
                &window_transform,
                &projection,
                geometries,
            )?;
        }

        write_geotiff(&path, &values, width, height, &window_transform, &projection)
    }
}

/// Pixel window `(c0, c1, r0, r1)` covering the mask envelope, clamped to the
/// raster extent. The envelope must already be in the raster's CRS.
///
/// # Errors
///
/// Returns [`Nc2TifError::EmptyClip`] when the envelope does not intersect
/// the raster at all (a degenerate clip is fatal, not skipped).
fn clip_window(
    grid: &SpatialGrid,
    geo_transform: &[f64; 6],
    envelope: Envelope,
    path: &Path,
) -> Result<(usize, usize, usize, usize)> {
    let (min_x, min_y, max_x, max_y) = envelope;

    let col_of = |x: f64| (x - geo_transform[0]) / geo_transform[1];
    let row_of = |y: f64| (y - geo_transform[3]) / geo_transform[5];

    let (col_a, col_b) = (col_of(min_x), col_of(max_x));
    let (row_a, row_b) = (row_of(min_y), row_of(max_y));

    let clamp = |lo: f64, hi: f64, size: usize| -> (usize, usize) {
        let lo = lo.floor().max(0.0) as usize;
        let hi = (hi.ceil().max(0.0) as usize).min(size);
        (lo.min(size), hi)
    };

    let (c0, c1) = clamp(col_a.min(col_b), col_a.max(col_b), grid.width());
    let (r0, r1) = clamp(row_a.min(row_b), row_a.max(row_b), grid.height());

    if c0 >= c1 || r0 >= r1 {
        return Err(Nc2TifError::EmptyClip {
            path: path.to_path_buf(),
        });
    }

    Ok((c0, c1, r0, r1))
}

fn projection_wkt(grid: &SpatialGrid) -> Result<String> {
    match &grid.crs_wkt {
        Some(wkt) => Ok(wkt.clone()),
        None => Ok(SpatialRef::from_epsg(4326)?.to_wkt()?),
    }
}

/// Burns the mask geometries (already in the raster's CRS) onto an in-memory
/// raster matching the slice window and blanks every pixel outside them.
fn apply_mask(
    values: &mut [f32],
    width: usize,
    height: usize,
    geo_transform: &[f64; 6],
    projection: &str,
    geometries: &[Geometry],
) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut mask_ds = driver.create_with_band_type::<u8, _>("", width, height, 1)?;
    mask_ds.set_geo_transform(geo_transform)?;
    mask_ds.set_projection(projection)?;

    let burn_values = vec![1.0; geometries.len()];
    rasterize(&mut mask_ds, &[1], geometries, &burn_values, None)?;

    let band = mask_ds.rasterband(1)?;
    let burned = band.read_as::<u8>((0, 0), (width, height), (width, height), None)?;

    for (value, &inside) in values.iter_mut().zip(burned.data()) {
        if inside == 0 {
            *value = f32::NAN;
        }
    }

    Ok(())
}

/// Writes one float32 slice as a DEFLATE-compressed GeoTIFF with NaN nodata.
fn write_geotiff(
    path: &Path,
    values: &[f32],
    width: usize,
    height: usize,
    geo_transform: &[f64; 6],
    projection: &str,
) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut options = CslStringList::new();
    options.add_string("COMPRESS=DEFLATE")?;

    let mut dataset =
        driver.create_with_band_type_with_options::<f32, _>(path, width, height, 1, &options)?;
    dataset.set_geo_transform(geo_transform)?;
    dataset.set_projection(projection)?;

    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(Some(f64::NAN))?;

    let mut buffer = Buffer::new((width, height), values.to_vec());
    band.write((0, 0), (width, height), &mut buffer)?;

    Ok(())
}

/// Fans the export out over a fixed-size worker pool.
///
/// Creates the band's output directory (idempotent), then applies the
/// exporter to every time index on a dedicated thread pool, consuming
/// completions in whatever order they arrive for the progress bar. Returns
/// once all tasks finish; the first task error aborts the run and the
/// remaining tasks are abandoned with the pool. Files already written stay
/// on disk.
pub fn run_export(
    series: &ResampledSeries,
    mask: Option<&MaskGeometry>,
    config: &ExportConfig,
) -> Result<()> {
    let band_dir = config.out_dir.join(&series.band_name);
    fs::create_dir_all(&band_dir)?;

    let total = series.num_buckets();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers.max(1))
        .build()
        .map_err(|e| {
            Nc2TifError::ThreadPoolError(format!(
                "Failed to initialize pool with {} workers: {}",
                config.num_workers, e
            ))
        })?;

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] Exporting {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pool.install(|| {
        (0..total)
            .into_par_iter()
            .progress_with(bar.clone())
            .try_for_each(|index| {
                ExportTask {
                    index,
                    series,
                    mask,
                    band_dir: &band_dir,
                }
                .run()
            })
    })?;

    bar.finish();
    Ok(())
}

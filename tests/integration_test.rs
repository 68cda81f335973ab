//! End-to-end integration tests: netCDF cube in, compressed GeoTIFFs out
//!
//! Each test builds a real netCDF file in a temp directory, runs the full
//! resample + export pipeline through the library API and inspects the
//! resulting GeoTIFFs with GDAL.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ndarray::{Array1, Array3};
use nc2tif::cube::RasterCube;
use nc2tif::errors::{Nc2TifError, Result};
use nc2tif::export::{run_export, ExportConfig};
use nc2tif::mask::MaskGeometry;
use nc2tif::resample::resample_mean;
use gdal::vector::Geometry;
use gdal::Dataset;
use std::path::Path;
use tempfile::tempdir;

const NY: usize = 3;
const NX: usize = 4;

fn datetime(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("valid date")
        .and_time(NaiveTime::MIN)
}

/// Writes a daily (time, y, x) cube starting 2019-01-01 where every pixel of
/// time step t holds the value t.
fn create_daily_cube(path: &Path, num_time: usize) {
    let days: Vec<f64> = (0..num_time).map(|t| t as f64).collect();
    create_cube_with_days(path, &days);
}

/// Same cube, with explicit day offsets from 2019-01-01; every pixel of a
/// step holds that step's day offset.
fn create_cube_with_days(path: &Path, days: &[f64]) {
    let num_time = days.len();
    let mut file = netcdf::create(path).expect("Failed to create netCDF file");

    file.add_dimension("time", num_time).expect("time dim");
    file.add_dimension("y", NY).expect("y dim");
    file.add_dimension("x", NX).expect("x dim");

    let mut time = file
        .add_variable::<f64>("time", &["time"])
        .expect("time var");
    time.put_attribute("units", "days since 2019-01-01")
        .expect("time units");
    let offsets = Array1::from_iter(days.iter().copied());
    time.put(offsets.view(), ..).expect("time values");

    let mut y = file.add_variable::<f64>("y", &["y"]).expect("y var");
    let y_coords = Array1::from_iter((0..NY).map(|r| (NY - r) as f64 - 0.5));
    y.put(y_coords.view(), ..).expect("y values");

    let mut x = file.add_variable::<f64>("x", &["x"]).expect("x var");
    let x_coords = Array1::from_iter((0..NX).map(|c| c as f64 + 0.5));
    x.put(x_coords.view(), ..).expect("x values");

    let mut band = file
        .add_variable::<f32>("aod", &["time", "y", "x"])
        .expect("band var");
    let values: Vec<f32> = days
        .iter()
        .flat_map(|&day| vec![day as f32; NY * NX])
        .collect();
    let data = Array3::from_shape_vec((num_time, NY, NX), values).expect("band shape");
    band.put(data.view(), ..).expect("band values");
}

fn read_tif(path: &Path) -> (Vec<f32>, [f64; 6], (usize, usize)) {
    let dataset = Dataset::open(path).expect("Failed to open GeoTIFF");
    let size = dataset.raster_size();
    let transform = dataset.geo_transform().expect("geo transform");
    let band = dataset.rasterband(1).expect("raster band");
    let buffer = band
        .read_as::<f32>((0, 0), size, size, None)
        .expect("band read");
    (buffer.data().to_vec(), transform, size)
}

#[test]
fn test_five_day_export_end_to_end() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    create_daily_cube(&nc_path, 10);

    let cube = RasterCube::open(&nc_path, 4)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "5D")?;

    assert_eq!(series.num_buckets(), 2);
    assert_eq!(series.times, vec![datetime(2019, 1, 1), datetime(2019, 1, 6)]);

    let config = ExportConfig {
        out_dir: temp_dir.path().join("compressed"),
        num_workers: 2,
    };
    run_export(&series, None, &config)?;

    let band_dir = temp_dir.path().join("compressed").join("aod");
    let mut entries: Vec<String> = std::fs::read_dir(&band_dir)?
        .filter_map(|entry| Some(entry.ok()?.file_name().to_string_lossy().into_owned()))
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["5D__2019-01-01.tif", "5D__2019-01-06.tif"]);

    // Bucket 0 averages days 0..=4, bucket 1 averages days 5..=9
    let (first, transform, size) = read_tif(&band_dir.join("5D__2019-01-01.tif"));
    assert_eq!(size, (NX, NY));
    assert_eq!(transform, [0.0, 1.0, 0.0, 3.0, 0.0, -1.0]);
    assert!(first.iter().all(|&v| v == 2.0));

    let (second, _, _) = read_tif(&band_dir.join("5D__2019-01-06.tif"));
    assert!(second.iter().all(|&v| v == 7.0));

    Ok(())
}

#[test]
fn test_export_rerun_overwrites_cleanly() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    create_daily_cube(&nc_path, 4);

    let cube = RasterCube::open(&nc_path, 200)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "2D")?;

    let config = ExportConfig {
        out_dir: temp_dir.path().join("compressed"),
        num_workers: 1,
    };

    // Output directory creation is idempotent and files are overwritten
    run_export(&series, None, &config)?;
    run_export(&series, None, &config)?;

    let band_dir = temp_dir.path().join("compressed").join("aod");
    let count = std::fs::read_dir(&band_dir)?.count();
    assert_eq!(count, 2);

    Ok(())
}

#[test]
fn test_full_extent_mask_keeps_all_pixels() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    create_daily_cube(&nc_path, 5);

    let cube = RasterCube::open(&nc_path, 200)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "5D")?;

    // Polygon well outside the raster extent on all sides
    let polygon = Geometry::from_wkt("POLYGON((-1 -1,5 -1,5 4,-1 4,-1 -1))")?;
    let mask = MaskGeometry::from_geometries(&[polygon])?;
    assert_eq!(mask.len(), 1);
    assert_eq!(mask.envelope(), (-1.0, -1.0, 5.0, 4.0));

    let config = ExportConfig {
        out_dir: temp_dir.path().join("masked"),
        num_workers: 1,
    };
    run_export(&series, Some(&mask), &config)?;

    let tif = temp_dir
        .path()
        .join("masked")
        .join("aod")
        .join("5D__2019-01-01.tif");
    let (values, _, size) = read_tif(&tif);

    // A mask covering the whole raster introduces no missing pixels
    assert_eq!(size, (NX, NY));
    assert!(values.iter().all(|&v| v == 2.0));

    Ok(())
}

#[test]
fn test_gapped_axis_writes_nan_file_for_empty_bucket() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    // Days 1-2 are absent: the middle two-day bucket has no samples
    create_cube_with_days(&nc_path, &[0.0, 4.0]);

    let cube = RasterCube::open(&nc_path, 200)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "2D")?;
    assert_eq!(series.num_buckets(), 3);

    let config = ExportConfig {
        out_dir: temp_dir.path().join("compressed"),
        num_workers: 2,
    };
    run_export(&series, None, &config)?;

    let band_dir = temp_dir.path().join("compressed").join("aod");
    let mut entries: Vec<String> = std::fs::read_dir(&band_dir)?
        .filter_map(|entry| Some(entry.ok()?.file_name().to_string_lossy().into_owned()))
        .collect();
    entries.sort();
    assert_eq!(
        entries,
        vec![
            "2D__2019-01-01.tif",
            "2D__2019-01-03.tif",
            "2D__2019-01-05.tif"
        ]
    );

    // The empty bucket's file exists and is all missing
    let (middle, _, _) = read_tif(&band_dir.join("2D__2019-01-03.tif"));
    assert!(middle.iter().all(|v| v.is_nan()));

    let (first, _, _) = read_tif(&band_dir.join("2D__2019-01-01.tif"));
    assert!(first.iter().all(|&v| v == 0.0));

    Ok(())
}

#[test]
fn test_disjoint_mask_aborts_with_empty_clip() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    create_daily_cube(&nc_path, 2);

    let cube = RasterCube::open(&nc_path, 200)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "2D")?;

    // Polygon nowhere near the raster extent
    let polygon = Geometry::from_wkt("POLYGON((100 80,101 80,101 81,100 81,100 80))")?;
    let mask = MaskGeometry::from_geometries(&[polygon])?;

    let config = ExportConfig {
        out_dir: temp_dir.path().join("compressed"),
        num_workers: 1,
    };
    assert!(matches!(
        run_export(&series, Some(&mask), &config),
        Err(Nc2TifError::EmptyClip { .. })
    ));

    Ok(())
}

#[test]
fn test_missing_input_exits_with_code_1() {
    let temp_dir = tempdir().expect("Failed to create temp dir");

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_nc2tif"))
        .current_dir(temp_dir.path())
        .args(["no_such_file.nc", "aod"])
        .output()
        .expect("Failed to run binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));

    // Nothing is created before the input check
    assert!(!temp_dir.path().join("compressed").exists());
}

#[test]
fn test_daily_resolution_writes_one_file_per_step() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let nc_path = temp_dir.path().join("cube.nc");
    create_daily_cube(&nc_path, 3);

    let cube = RasterCube::open(&nc_path, 200)?;
    let band = cube.band("aod")?;
    let series = resample_mean(&cube, &band, "1D")?;

    let config = ExportConfig {
        out_dir: temp_dir.path().join("compressed"),
        num_workers: 2,
    };
    run_export(&series, None, &config)?;

    let band_dir = temp_dir.path().join("compressed").join("aod");
    let mut entries: Vec<String> = std::fs::read_dir(&band_dir)?
        .filter_map(|entry| Some(entry.ok()?.file_name().to_string_lossy().into_owned()))
        .collect();
    entries.sort();
    assert_eq!(
        entries,
        vec![
            "1D__2019-01-01.tif",
            "1D__2019-01-02.tif",
            "1D__2019-01-03.tif"
        ]
    );

    // Each daily bucket is the identity mean of its single step
    let (values, _, _) = read_tif(&band_dir.join("1D__2019-01-02.tif"));
    assert!(values.iter().all(|&v| v == 1.0));

    Ok(())
}

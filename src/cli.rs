//! Defines command-line interface options using `clap` for the nc2tif application.

use clap::Parser;
use std::path::PathBuf;

/// Compress a processed netCDF file into multiple compressed raster files
#[derive(Parser, Debug)]
#[command(
    version,
    name = "nc2tif",
    about = "Resample a netCDF band in time and export each slice as a compressed GeoTIFF"
)]
pub struct Args {
    /// Path to the processed netCDF file
    pub netcdf: PathBuf,

    /// Name of the band to export
    pub band: String,

    /// Resampling rate of the time dimension (e.g. 1D, 5D, 6H, 1M)
    #[arg(long, default_value = "1D")]
    pub time_resolution: String,

    /// Path to the shapefile (.shp) for masking
    #[arg(long)]
    pub shp: Option<PathBuf>,

    /// Chunk size along the time dimension for lazy loading
    #[arg(long, default_value_t = 200)]
    pub chunk_size: usize,

    /// Number of workers spawned for compression. Defaults to number of CPU cores.
    #[arg(long, default_value_t = num_cpus::get())]
    pub num_workers: usize,

    /// Directory the compressed files are written into
    #[arg(long, default_value = "compressed")]
    pub out_dir: PathBuf,
}

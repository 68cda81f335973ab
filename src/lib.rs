//! nc2tif: batch conversion of a netCDF raster band into compressed GeoTIFFs
//!
//! nc2tif loads one (time, y, x) band from a netCDF raster cube, aggregates
//! it to a coarser time resolution by per-bucket means, optionally clips each
//! resulting slice to shapefile geometries, and writes every slice as an
//! independent compressed GeoTIFF, fanned out over a fixed-size worker pool.
//!
//! ## Module Organization
//!
//! - [`cube`]: netCDF source loading, band selection and the spatial grid
//! - [`timeaxis`]: CF time decoding and resampling-bucket arithmetic
//! - [`resample`]: temporal mean aggregation onto the coarser axis
//! - [`mask`]: shapefile loading, reprojection and simplification
//! - [`export`]: per-slice GeoTIFF writing and the parallel worker pool
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use nc2tif::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> nc2tif::errors::Result<()> {
//! let cube = RasterCube::open(Path::new("data.nc"), 200)?;
//! let band = cube.band("aod")?;
//! let series = resample_mean(&cube, &band, "1D")?;
//!
//! let config = ExportConfig {
//!     out_dir: "compressed".into(),
//!     num_workers: num_cpus::get(),
//! };
//! run_export(&series, None, &config)?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod cli;
pub mod cube;
pub mod errors;
pub mod export;
pub mod mask;
pub mod resample;
pub mod timeaxis;

// Direct re-exports for the public API
pub use cube::*;
pub use errors::*;
pub use export::*;
pub use mask::*;
pub use resample::*;
pub use timeaxis::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::cube::{Band, RasterCube, SpatialGrid};
    pub use crate::errors::{Nc2TifError, Result};
    pub use crate::export::{run_export, ExportConfig, ExportTask};
    pub use crate::mask::MaskGeometry;
    pub use crate::resample::{resample_mean, ResampledSeries};
    pub use crate::timeaxis::{TimeResolution, TimeUnit};
}

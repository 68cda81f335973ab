//! Centralized error handling for nc2tif
//!
//! This module provides structured error types to replace the generic `Box<dyn Error>`,
//! enabling better error context and type safety.

use std::fmt;
use std::path::PathBuf;

/// Main error type for nc2tif operations
#[derive(Debug)]
pub enum Nc2TifError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// GDAL raster/vector operation errors
    GdalError(gdal::errors::GdalError),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Requested band not found in the cube; carries the names the caller can retry with
    BandNotFound { band: String, available: Vec<String> },

    /// Band does not have the expected (time, y, x) layout
    UnsupportedLayout { var: String, dims: Vec<String> },

    /// Coordinate variable missing from the cube
    MissingCoordinate { name: String },

    /// A spatial axis is too short to derive a resolution from
    DegenerateGrid { axis: String },

    /// Time axis could not be decoded from its CF units
    TimeUnits(String),

    /// Time-resolution specification could not be parsed
    InvalidResolution(String),

    /// Clip geometry does not intersect the raster extent
    EmptyClip { path: PathBuf },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl fmt::Display for Nc2TifError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nc2TifError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            Nc2TifError::GdalError(e) => write!(f, "GDAL error: {}", e),
            Nc2TifError::IoError(e) => write!(f, "I/O error: {}", e),
            Nc2TifError::ArrayError(e) => write!(f, "Array error: {}", e),
            Nc2TifError::BandNotFound { band, available } => write!(
                f,
                "Band '{}' not found in file (available: {})",
                band,
                available.join(", ")
            ),
            Nc2TifError::UnsupportedLayout { var, dims } => write!(
                f,
                "Variable '{}' does not have a (time, y, x) layout (dimensions: [{}])",
                var,
                dims.join(", ")
            ),
            Nc2TifError::MissingCoordinate { name } => {
                write!(f, "Coordinate variable '{}' not found in file", name)
            }
            Nc2TifError::DegenerateGrid { axis } => write!(
                f,
                "Spatial axis '{}' has fewer than two coordinates; cannot derive a resolution",
                axis
            ),
            Nc2TifError::TimeUnits(msg) => write!(f, "Cannot decode time axis: {}", msg),
            Nc2TifError::InvalidResolution(msg) => {
                write!(f, "Invalid time resolution: {}", msg)
            }
            Nc2TifError::EmptyClip { path } => write!(
                f,
                "Clip geometries do not intersect the raster extent for '{}'",
                path.display()
            ),
            Nc2TifError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            Nc2TifError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Nc2TifError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Nc2TifError::NetCDFError(e) => Some(e),
            Nc2TifError::GdalError(e) => Some(e),
            Nc2TifError::IoError(e) => Some(e),
            Nc2TifError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for Nc2TifError {
    fn from(error: netcdf::Error) -> Self {
        Nc2TifError::NetCDFError(error)
    }
}

impl From<gdal::errors::GdalError> for Nc2TifError {
    fn from(error: gdal::errors::GdalError) -> Self {
        Nc2TifError::GdalError(error)
    }
}

impl From<std::io::Error> for Nc2TifError {
    fn from(error: std::io::Error) -> Self {
        Nc2TifError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for Nc2TifError {
    fn from(error: ndarray::ShapeError) -> Self {
        Nc2TifError::ArrayError(error)
    }
}

impl From<String> for Nc2TifError {
    fn from(error: String) -> Self {
        Nc2TifError::Generic(error)
    }
}

impl From<&str> for Nc2TifError {
    fn from(error: &str) -> Self {
        Nc2TifError::Generic(error.to_string())
    }
}

/// Result type alias for nc2tif operations
pub type Result<T> = std::result::Result<T, Nc2TifError>;

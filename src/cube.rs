//! Source loading and band selection for netCDF raster cubes
//!
//! A [`RasterCube`] is an open handle to a (time, y, x) netCDF file. Data is
//! never materialized along the whole time axis at once: reads go through
//! [`RasterCube::read_time_chunk`] windows bounded by the configured chunk
//! size, which keeps memory use flat for long time series.

use crate::errors::{Nc2TifError, Result};
use ndarray::Array3;
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};

/// Name of the time dimension a band is expected to lead with
pub const TIME_DIM: &str = "time";

/// An open netCDF raster cube with lazy, chunked access along the time axis
pub struct RasterCube {
    file: netcdf::File,
    path: PathBuf,
    chunk_size: usize,
}

impl RasterCube {
    /// Opens the cube at `path`. The caller is expected to have checked that
    /// the path exists; a vanished file still fails cleanly here.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = netcdf::open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The underlying netCDF handle, for coordinate and attribute reads
    pub fn file(&self) -> &netcdf::File {
        &self.file
    }

    /// Names of the data variables (everything with at least two dimensions;
    /// one-dimensional variables are coordinates, not bands).
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .file
            .variables()
            .filter(|var| var.dimensions().len() >= 2)
            .map(|var| var.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Resolves a named band from the cube.
    ///
    /// # Errors
    ///
    /// Returns [`Nc2TifError::BandNotFound`] carrying all data-variable names
    /// when the name does not resolve, and
    /// [`Nc2TifError::UnsupportedLayout`] when the variable is not laid out
    /// as (time, y, x).
    pub fn band(&self, name: &str) -> Result<Band> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| Nc2TifError::BandNotFound {
                band: name.to_string(),
                available: self.variable_names(),
            })?;

        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        let shape: Vec<usize> = var.dimensions().iter().map(netcdf::Dimension::len).collect();

        if dims.len() != 3 || dims[0] != TIME_DIM {
            return Err(Nc2TifError::UnsupportedLayout {
                var: name.to_string(),
                dims,
            });
        }

        let fill_value = var
            .attribute("_FillValue")
            .and_then(|attr| match attr.value().ok()? {
                AttributeValue::Float(v) => Some(v),
                AttributeValue::Double(v) => Some(v as f32),
                AttributeValue::Short(v) => Some(f32::from(v)),
                AttributeValue::Int(v) => Some(v as f32),
                _ => None,
            });

        Ok(Band {
            name: name.to_string(),
            dims,
            shape: [shape[0], shape[1], shape[2]],
            fill_value,
        })
    }

    /// Reads the spatial grid (coordinates and CRS) the band sits on.
    pub fn grid_for(&self, band: &Band) -> Result<SpatialGrid> {
        let y = self.coordinate_values(band.y_dim())?;
        let x = self.coordinate_values(band.x_dim())?;
        Ok(SpatialGrid {
            x,
            y,
            crs_wkt: self.crs_wkt(),
        })
    }

    fn coordinate_values(&self, name: &str) -> Result<Vec<f64>> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| Nc2TifError::MissingCoordinate {
                name: name.to_string(),
            })?;
        Ok(var.get_values::<f64, _>(..)?)
    }

    /// WKT of the cube's coordinate reference system, if the file records one
    /// under the usual grid-mapping conventions.
    fn crs_wkt(&self) -> Option<String> {
        for var_name in ["spatial_ref", "crs"] {
            let var = match self.file.variable(var_name) {
                Some(var) => var,
                None => continue,
            };
            for attr_name in ["spatial_ref", "crs_wkt"] {
                if let Some(attr) = var.attribute(attr_name) {
                    if let Ok(AttributeValue::Str(wkt)) = attr.value() {
                        return Some(wkt);
                    }
                }
            }
        }
        None
    }

    /// Reads the band's `[t0, t1)` time window as a (time, y, x) array.
    /// Fill values are normalized to NaN so downstream code has a single
    /// missing-value representation.
    pub fn read_time_chunk(&self, band: &Band, t0: usize, t1: usize) -> Result<Array3<f32>> {
        let var = self
            .file
            .variable(&band.name)
            .ok_or_else(|| Nc2TifError::BandNotFound {
                band: band.name.clone(),
                available: self.variable_names(),
            })?;

        let [_, ny, nx] = band.shape;
        let values: Vec<f32> = var.get_values::<f32, _>((t0..t1, 0..ny, 0..nx))?;
        let mut data = Array3::from_shape_vec((t1 - t0, ny, nx), values)?;

        if let Some(fill) = band.fill_value {
            data.mapv_inplace(|v| if v == fill { f32::NAN } else { v });
        }

        Ok(data)
    }
}

/// A single named (time, y, x) variable selected from the cube
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: [usize; 3],
    pub fill_value: Option<f32>,
}

impl Band {
    pub fn time_dim(&self) -> &str {
        &self.dims[0]
    }

    pub fn y_dim(&self) -> &str {
        &self.dims[1]
    }

    pub fn x_dim(&self) -> &str {
        &self.dims[2]
    }

    pub fn num_time_steps(&self) -> usize {
        self.shape[0]
    }
}

/// The spatial grid a band sits on: coordinate centers per axis plus the
/// coordinate reference system, when the file records one.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub crs_wkt: Option<String>,
}

impl SpatialGrid {
    pub fn width(&self) -> usize {
        self.x.len()
    }

    pub fn height(&self) -> usize {
        self.y.len()
    }

    /// Signed step between two adjacent coordinates of an axis.
    fn step(values: &[f64], axis: &str) -> Result<f64> {
        if values.len() < 2 {
            return Err(Nc2TifError::DegenerateGrid {
                axis: axis.to_string(),
            });
        }
        Ok(values[1] - values[0])
    }

    /// GDAL-style affine transform mapping pixel space to coordinate space.
    /// Coordinates are cell centers, so the origin backs up by half a step.
    pub fn geo_transform(&self) -> Result<[f64; 6]> {
        let dx = Self::step(&self.x, "x")?;
        let dy = Self::step(&self.y, "y")?;
        Ok([
            self.x[0] - dx / 2.0,
            dx,
            0.0,
            self.y[0] - dy / 2.0,
            0.0,
            dy,
        ])
    }

    /// Simplification tolerance for clip geometries: half of the finer
    /// spatial-axis resolution, evaluated from two adjacent grid coordinates.
    pub fn clip_tolerance(&self) -> Result<f64> {
        let dx = Self::step(&self.x, "x")?.abs();
        let dy = Self::step(&self.y, "y")?.abs();
        Ok(dx.min(dy) / 2.0)
    }
}

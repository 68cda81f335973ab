//! Clip-mask construction from a vector shapefile
//!
//! Geometries are reprojected to EPSG:4326 and simplified once with a
//! tolerance derived from the raster grid, then stored as WKB blobs. GDAL
//! geometry handles are not thread-safe, so the WKB form is what gets shared
//! read-only across export workers; each worker rehydrates its own handles.

use crate::cube::SpatialGrid;
use crate::errors::{Nc2TifError, Result};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::{Geometry, LayerAccess};
use gdal::Dataset;
use std::path::Path;

/// Bounding box in coordinate-space units: (min x, min y, max x, max y)
pub type Envelope = (f64, f64, f64, f64);

/// Reprojected, simplified clip geometries, immutable after construction
pub struct MaskGeometry {
    wkb: Vec<Vec<u8>>,
    envelope: Envelope,
}

impl MaskGeometry {
    /// Loads the first layer of a shapefile, reprojects every geometry to
    /// EPSG:4326 and simplifies it with half the finer grid resolution as
    /// tolerance. Simplification is a clip-speed optimization; the tolerance
    /// carries no accuracy bound.
    pub fn from_shapefile(path: &Path, grid: &SpatialGrid) -> Result<Self> {
        let tolerance = grid.clip_tolerance()?;

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;

        let mut target = SpatialRef::from_epsg(4326)?;
        target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let transform = match layer.spatial_ref() {
            Some(mut source) => {
                source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
                Some(CoordTransform::new(&source, &target)?)
            }
            // No .prj alongside the shapefile: take coordinates as-is
            None => None,
        };

        let mut wkb = Vec::new();
        let mut envelope = (
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );

        for feature in layer.features() {
            let geometry = match feature.geometry() {
                Some(geometry) => geometry,
                None => continue,
            };

            let simplified = match &transform {
                Some(ct) => geometry
                    .transform(ct)?
                    .simplify_preserve_topology(tolerance)?,
                None => geometry.simplify_preserve_topology(tolerance)?,
            };

            let bounds = simplified.envelope();
            envelope.0 = envelope.0.min(bounds.MinX);
            envelope.1 = envelope.1.min(bounds.MinY);
            envelope.2 = envelope.2.max(bounds.MaxX);
            envelope.3 = envelope.3.max(bounds.MaxY);

            wkb.push(simplified.wkb()?);
        }

        if wkb.is_empty() {
            return Err(Nc2TifError::Generic(format!(
                "Shapefile '{}' contains no geometries",
                path.display()
            )));
        }

        Ok(Self { wkb, envelope })
    }

    /// Builds a mask directly from already-prepared geometries (test helper
    /// and programmatic entry point); geometries must be in EPSG:4326.
    pub fn from_geometries(geometries: &[Geometry]) -> Result<Self> {
        let mut wkb = Vec::new();
        let mut envelope = (
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );

        for geometry in geometries {
            let bounds = geometry.envelope();
            envelope.0 = envelope.0.min(bounds.MinX);
            envelope.1 = envelope.1.min(bounds.MinY);
            envelope.2 = envelope.2.max(bounds.MaxX);
            envelope.3 = envelope.3.max(bounds.MaxY);
            wkb.push(geometry.wkb()?);
        }

        if wkb.is_empty() {
            return Err(Nc2TifError::Generic(
                "Mask requires at least one geometry".to_string(),
            ));
        }

        Ok(Self { wkb, envelope })
    }

    /// Combined bounding box of all mask geometries
    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn len(&self) -> usize {
        self.wkb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wkb.is_empty()
    }

    /// Rehydrates GDAL geometry handles from the stored WKB; called once per
    /// export task, inside the worker that uses them.
    pub fn to_geometries(&self) -> Result<Vec<Geometry>> {
        self.wkb
            .iter()
            .map(|blob| Geometry::from_wkb(blob).map_err(Nc2TifError::from))
            .collect()
    }

    /// Rehydrates the geometries and reprojects them from EPSG:4326 into the
    /// raster's coordinate system when it differs, returning them with their
    /// combined envelope in that system. Windowing and rasterization must
    /// happen in the raster's own units.
    pub fn to_geometries_in(&self, projection_wkt: &str) -> Result<(Vec<Geometry>, Envelope)> {
        let mut geometries = self.to_geometries()?;

        let mut target = SpatialRef::from_wkt(projection_wkt)?;
        target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        if !matches!(target.auth_code(), Ok(4326)) {
            let mut source = SpatialRef::from_epsg(4326)?;
            source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
            let ct = CoordTransform::new(&source, &target)?;
            geometries = geometries
                .iter()
                .map(|geometry| geometry.transform(&ct).map_err(Nc2TifError::from))
                .collect::<Result<Vec<Geometry>>>()?;
        }

        let mut envelope = (
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for geometry in &geometries {
            let bounds = geometry.envelope();
            envelope.0 = envelope.0.min(bounds.MinX);
            envelope.1 = envelope.1.min(bounds.MinY);
            envelope.2 = envelope.2.max(bounds.MaxX);
            envelope.3 = envelope.3.max(bounds.MaxY);
        }

        Ok((geometries, envelope))
    }
}

//! Areas of interest: polygons plus the coordinate reference system they are expressed in.

use crate::crs::{Crs, CrsTransform};
use geo::{BoundingRect, Contains};
use geo_types::{Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use geojson::{GeoJson, JsonObject, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Geometry has no coordinate reference system")]
    MissingCrs,

    #[error("Unsupported coordinate reference system '{0}'")]
    UnsupportedCrs(String),

    #[error("Failed to parse GeoJSON")]
    Parse(#[source] geojson::Error),

    #[error("Failed to read geometry file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Geometry contains no polygons")]
    NoPolygons,

    #[error("Coordinate transformation failed: {0}")]
    Projection(String),
}

/// A vector area of interest.
///
/// The CRS is optional so that geometries of unknown origin can be represented; clipping
/// with such a geometry fails with [`GeometryError::MissingCrs`].
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    crs: Option<Crs>,
    polygons: MultiPolygon<f64>,
}

impl Geometry {
    pub fn new(polygons: impl Into<MultiPolygon<f64>>, crs: Option<Crs>) -> Self {
        Self {
            crs,
            polygons: polygons.into(),
        }
    }

    /// Axis-aligned rectangle from `(min_x, min_y)` to `(max_x, max_y)`.
    pub fn rectangle(min: (f64, f64), max: (f64, f64), crs: Option<Crs>) -> Self {
        let rect = Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 });
        Self::new(rect.to_polygon(), crs)
    }

    /// Parses a GeoJSON document (feature collection, feature or bare geometry).
    ///
    /// Polygon and multipolygon members are collected, everything else is ignored. The legacy
    /// `crs` member is honoured: a named CRS is parsed, `"crs": null` leaves the geometry
    /// without CRS and a missing member means WGS84 longitude/latitude.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Parse`] for invalid GeoJSON, [`GeometryError::UnsupportedCrs`]
    /// for an unknown `crs` and [`GeometryError::NoPolygons`] if nothing polygonal is found.
    ///
    /// # Examples
    ///
    /// ```
    /// use merge_downloader::{Crs, Geometry};
    ///
    /// let geometry = Geometry::from_geojson(r#"{
    ///     "type": "Polygon",
    ///     "coordinates": [[[-48, -16], [-47, -16], [-47, -15], [-48, -15], [-48, -16]]]
    /// }"#).unwrap();
    /// assert_eq!(geometry.crs(), Some(Crs::WGS84));
    /// assert!(geometry.contains(-47.5, -15.5));
    /// ```
    pub fn from_geojson(text: &str) -> Result<Self, GeometryError> {
        let geojson: GeoJson = text.parse().map_err(GeometryError::Parse)?;
        let foreign_members = match &geojson {
            GeoJson::FeatureCollection(fc) => fc.foreign_members.as_ref(),
            GeoJson::Feature(f) => f.foreign_members.as_ref(),
            GeoJson::Geometry(g) => g.foreign_members.as_ref(),
        };
        let crs = crs_member(foreign_members)?;

        let mut polygons = Vec::new();
        match &geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    if let Some(geometry) = &feature.geometry {
                        collect_polygons(&geometry.value, &mut polygons);
                    }
                }
            }
            GeoJson::Feature(f) => {
                if let Some(geometry) = &f.geometry {
                    collect_polygons(&geometry.value, &mut polygons);
                }
            }
            GeoJson::Geometry(g) => collect_polygons(&g.value, &mut polygons),
        }
        if polygons.is_empty() {
            return Err(GeometryError::NoPolygons);
        }
        Ok(Self::new(MultiPolygon(polygons), crs))
    }

    pub async fn from_geojson_file(path: &Path) -> Result<Self, GeometryError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GeometryError::Read(path.to_path_buf(), e))?;
        Self::from_geojson(&text)
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn require_crs(&self) -> Result<Crs, GeometryError> {
        self.crs.ok_or(GeometryError::MissingCrs)
    }

    /// Expresses the geometry in `target`, transforming every vertex.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::MissingCrs`] without a source CRS and
    /// [`GeometryError::Projection`] if a vertex cannot be transformed.
    pub fn reproject(&self, target: &Crs) -> Result<Geometry, GeometryError> {
        let source = self.require_crs()?;
        if source.is_equivalent(target) {
            return Ok(Self::new(self.polygons.clone(), Some(*target)));
        }
        let transform = source.transformer_to(target)?;
        let polygons = self
            .polygons
            .iter()
            .map(|polygon| {
                let interiors = polygon
                    .interiors()
                    .iter()
                    .map(|ring| map_ring(&transform, ring))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Polygon::new(map_ring(&transform, polygon.exterior())?, interiors))
            })
            .collect::<Result<Vec<_>, GeometryError>>()?;
        Ok(Self::new(MultiPolygon(polygons), Some(*target)))
    }

    /// Bounding box of all vertices, `None` for an empty geometry.
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.polygons.bounding_rect()
    }

    /// Whether `(x, y)` lies strictly inside any polygon, outside its holes.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        self.polygons.iter().any(|polygon| polygon.contains(&point))
    }
}

fn map_ring(transform: &CrsTransform, ring: &LineString<f64>) -> Result<LineString<f64>, GeometryError> {
    ring.coords()
        .map(|c| transform.apply(c.x, c.y).map(|(x, y)| Coord { x, y }))
        .collect()
}

fn crs_member(foreign_members: Option<&JsonObject>) -> Result<Option<Crs>, GeometryError> {
    let Some(member) = foreign_members.and_then(|members| members.get("crs")) else {
        return Ok(Some(Crs::WGS84));
    };
    if member.is_null() {
        return Ok(None);
    }
    let name = member
        .get("properties")
        .and_then(|properties| properties.get("name"))
        .and_then(|name| name.as_str())
        .ok_or_else(|| GeometryError::UnsupportedCrs(member.to_string()))?;
    name.parse().map(Some)
}

fn to_ring(positions: &[Vec<f64>]) -> LineString<f64> {
    positions
        .iter()
        .filter(|position| position.len() >= 2)
        .map(|position| Coord {
            x: position[0],
            y: position[1],
        })
        .collect()
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    Some(Polygon::new(
        to_ring(exterior),
        holes.iter().map(|hole| to_ring(hole)).collect(),
    ))
}

fn collect_polygons(value: &Value, polygons: &mut Vec<Polygon<f64>>) {
    match value {
        Value::Polygon(rings) => polygons.extend(to_polygon(rings)),
        Value::MultiPolygon(members) => {
            polygons.extend(members.iter().filter_map(|rings| to_polygon(rings)))
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_polygons(&geometry.value, polygons);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_WITH_HOLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "square"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [
                    [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                    [[4, 4], [6, 4], [6, 6], [4, 6], [4, 4]]
                ]
            }
        }, {
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [50, 50]}
        }]
    }"#;

    #[test]
    fn test_contains_respects_holes() -> Result<(), GeometryError> {
        let geometry = Geometry::from_geojson(SQUARE_WITH_HOLE)?;
        assert_eq!(geometry.polygons().0.len(), 1);
        assert!(geometry.contains(1.0, 1.0));
        assert!(geometry.contains(9.5, 5.0));
        assert!(!geometry.contains(5.0, 5.0));
        assert!(!geometry.contains(11.0, 5.0));
        assert!(!geometry.contains(-0.1, 5.0));
        Ok(())
    }

    #[test]
    fn test_contains_concave_multipolygon() {
        // An L-shaped polygon plus a detached unit square.
        let l_shape = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 1.0), (1.0, 1.0), (1.0, 4.0), (0.0, 4.0)]),
            vec![],
        );
        let island = Geometry::rectangle((10.0, 10.0), (11.0, 11.0), None).polygons().0[0].clone();
        let geometry = Geometry::new(MultiPolygon(vec![l_shape, island]), Some(Crs::WGS84));

        assert!(geometry.contains(0.5, 3.5));
        assert!(geometry.contains(3.5, 0.5));
        assert!(!geometry.contains(2.0, 2.0));
        assert!(geometry.contains(10.5, 10.5));
        assert!(!geometry.contains(7.0, 7.0));

        let bbox = geometry.bounding_box().unwrap();
        assert_eq!((bbox.min().x, bbox.min().y), (0.0, 0.0));
        assert_eq!((bbox.max().x, bbox.max().y), (11.0, 11.0));
    }

    #[test]
    fn test_reproject_into_conic_projection() -> Result<(), GeometryError> {
        let paris = Geometry::rectangle((2.2, 48.8), (2.5, 48.9), Some(Crs::WGS84));
        let lambert = Crs::from_epsg(2154)?;
        let projected = paris.reproject(&lambert)?;
        let bbox = projected.bounding_box().unwrap();
        // Lambert 93 puts Paris around (652 km, 6862 km).
        assert!(bbox.min().x > 600_000.0 && bbox.max().x < 700_000.0, "{bbox:?}");
        assert!(bbox.min().y > 6_800_000.0 && bbox.max().y < 6_900_000.0, "{bbox:?}");
        assert!(projected.contains(652_000.0, 6_862_000.0));
        Ok(())
    }

    #[test]
    fn test_named_crs_member() -> Result<(), GeometryError> {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::31983"}},
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[300000, 7400000], [310000, 7400000], [310000, 7410000], [300000, 7400000]]]
                ]}
            }]
        }"#;
        let geometry = Geometry::from_geojson(text)?;
        assert_eq!(geometry.crs(), Some(Crs::from_epsg(31983)?));
        Ok(())
    }

    #[test]
    fn test_null_crs_member_means_unknown() -> Result<(), GeometryError> {
        let text = r#"{
            "type": "Feature",
            "crs": null,
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}
        }"#;
        let geometry = Geometry::from_geojson(text)?;
        assert_eq!(geometry.crs(), None);
        assert!(matches!(geometry.require_crs(), Err(GeometryError::MissingCrs)));
        Ok(())
    }

    #[test]
    fn test_rejects_non_polygonal_input() {
        let text = r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#;
        assert!(matches!(
            Geometry::from_geojson(text),
            Err(GeometryError::NoPolygons)
        ));
        assert!(matches!(
            Geometry::from_geojson("{not json"),
            Err(GeometryError::Parse(_))
        ));
    }

    #[test]
    fn test_reproject_round_trip() -> Result<(), GeometryError> {
        let geometry = Geometry::rectangle((-46.0, -24.0), (-45.0, -23.0), Some(Crs::WGS84));
        let utm = Crs::from_epsg(31983)?;
        let projected = geometry.reproject(&utm)?;
        assert_eq!(projected.crs(), Some(utm));
        let bbox = projected.bounding_box().unwrap();
        assert!(bbox.min().x > 100_000.0 && bbox.max().x < 900_000.0);
        assert!(bbox.min().y > 7_000_000.0);

        let back = projected.reproject(&Crs::WGS84)?;
        let bbox = back.bounding_box().unwrap();
        assert!((bbox.min().x + 46.0).abs() < 1e-6);
        assert!((bbox.max().y + 23.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_reproject_without_crs_fails() {
        let geometry = Geometry::rectangle((0.0, 0.0), (1.0, 1.0), None);
        assert!(matches!(
            geometry.reproject(&Crs::WGS84),
            Err(GeometryError::MissingCrs)
        ));
    }

    #[tokio::test]
    async fn test_from_file() -> Result<(), GeometryError> {
        let dir = tempfile::tempdir().map_err(|e| GeometryError::Read(PathBuf::new(), e))?;
        let path = dir.path().join("aoi.geojson");
        std::fs::write(&path, SQUARE_WITH_HOLE).map_err(|e| GeometryError::Read(path.clone(), e))?;
        let geometry = Geometry::from_geojson_file(&path).await?;
        assert!(geometry.contains(2.0, 2.0));
        assert!(matches!(
            Geometry::from_geojson_file(&dir.path().join("missing.geojson")).await,
            Err(GeometryError::Read(..))
        ));
        Ok(())
    }
}

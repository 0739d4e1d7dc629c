//! Coordinate reference systems understood by the clipper.
//!
//! A [`Crs`] is an EPSG code paired with its PROJ.4 definition, looked up in the EPSG registry
//! shipped by `crs-definitions`. Transformations between two systems go through `proj4rs`.

use crate::geometry::GeometryError;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Codes whose coordinates are interchangeable with WGS84 longitude/latitude at grid resolution
/// (WGS84 itself and SIRGAS 2000).
const WGS84_COMPATIBLE: [u32; 2] = [4326, 4674];

#[derive(Clone, Copy)]
pub struct Crs {
    epsg: u32,
    definition: &'static str,
}

impl Crs {
    pub const WGS84: Crs = Crs {
        epsg: 4326,
        definition: WGS84_DEFINITION,
    };

    /// Looks `epsg` up in the EPSG registry.
    ///
    /// The legacy Google code 900913 is accepted as an alias of 3857.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnsupportedCrs`] for codes the registry does not know.
    pub fn from_epsg(epsg: u32) -> Result<Self, GeometryError> {
        let epsg = if epsg == 900913 { 3857 } else { epsg };
        if epsg == 4326 {
            return Ok(Crs::WGS84);
        }
        u16::try_from(epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| Crs {
                epsg,
                definition: def.proj4,
            })
            .ok_or_else(|| GeometryError::UnsupportedCrs(format!("EPSG:{epsg}")))
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// PROJ.4 definition string, e.g. `+proj=utm +zone=23 +south ...`.
    pub fn definition(&self) -> &'static str {
        self.definition
    }

    /// Whether coordinates are longitude/latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        self.definition.contains("+proj=longlat")
    }

    /// Whether coordinates in `self` and `other` are interchangeable without transformation.
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        self.epsg == other.epsg
            || (WGS84_COMPATIBLE.contains(&self.epsg) && WGS84_COMPATIBLE.contains(&other.epsg))
    }

    /// Prepares a transformation from `self` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Projection`] if either definition cannot be initialised.
    pub fn transformer_to(&self, target: &Crs) -> Result<CrsTransform, GeometryError> {
        CrsTransform::new(self, target)
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.epsg == other.epsg
    }
}

impl Eq for Crs {}

impl Hash for Crs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epsg.hash(state);
    }
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Crs(EPSG:{})", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Parses `EPSG:4326`, `4326`, `urn:ogc:def:crs:EPSG::4326`, `urn:ogc:def:crs:OGC:1.3:CRS84`
/// and `CRS84`.
impl FromStr for Crs {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let upper = text.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Crs::WGS84);
        }
        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG") || !upper.contains(':'))
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| GeometryError::UnsupportedCrs(text.to_string()))?;
        Crs::from_epsg(code)
    }
}

/// A ready-to-use transformation between two coordinate reference systems.
///
/// Geographic coordinates go in and come out in degrees; the radian conversion `proj4rs`
/// expects is handled here.
pub struct CrsTransform {
    source: Crs,
    target: Crs,
    source_proj: Proj,
    target_proj: Proj,
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CrsTransform {
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, GeometryError> {
        let init = |crs: &Crs| {
            Proj::from_proj_string(crs.definition)
                .map_err(|e| GeometryError::Projection(format!("Invalid projection {crs}: {e:?}")))
        };
        Ok(Self {
            source: *source,
            target: *target,
            source_proj: init(source)?,
            target_proj: init(target)?,
        })
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Converts `(x, y)` from the source system into the target system.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Projection`] when the point cannot be projected, e.g. far
    /// outside the domain of a transverse Mercator zone.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64), GeometryError> {
        if self.source.is_equivalent(&self.target) {
            return Ok((x, y));
        }
        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.source_proj, &self.target_proj, &mut point).map_err(|e| {
            GeometryError::Projection(format!(
                "Transforming ({x}, {y}) from {} to {} failed: {e:?}",
                self.source, self.target
            ))
        })?;
        if self.target.is_geographic() {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64), tolerance: f64) {
        assert!(
            (actual.0 - expected.0).abs() < tolerance && (actual.1 - expected.1).abs() < tolerance,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_parse_forms() -> Result<(), GeometryError> {
        assert_eq!("EPSG:4326".parse::<Crs>()?, Crs::WGS84);
        assert_eq!("epsg:4674".parse::<Crs>()?.epsg(), 4674);
        assert_eq!("urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>()?, Crs::WGS84);
        assert_eq!("urn:ogc:def:crs:EPSG::3857".parse::<Crs>()?.epsg(), 3857);
        assert_eq!("EPSG:31983".parse::<Crs>()?.epsg(), 31983);
        assert_eq!("900913".parse::<Crs>()?.epsg(), 3857);
        assert!("EPSG:99999".parse::<Crs>().is_err());
        assert!("EPSG:1".parse::<Crs>().is_err());
        assert!("urn:ogc:def:crs:OGC:1.3:4326X".parse::<Crs>().is_err());
        Ok(())
    }

    #[test]
    fn test_registry_codes_beyond_utm() -> Result<(), GeometryError> {
        // Lambert 93, ETRS89 / LAEA Europe and SAD69 / UTM 23S
        for (epsg, lon, lat) in [(2154, 2.35, 48.85), (3035, 10.0, 52.0), (29193, -45.5, -12.0)] {
            let crs = Crs::from_epsg(epsg)?;
            assert!(!crs.is_geographic(), "{crs}");
            let (x, y) = Crs::WGS84.transformer_to(&crs)?.apply(lon, lat)?;
            assert!(x.is_finite() && y.is_finite());
            assert_close(crs.transformer_to(&Crs::WGS84)?.apply(x, y)?, (lon, lat), 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_geographic_codes() -> Result<(), GeometryError> {
        assert!(Crs::WGS84.is_geographic());
        let sirgas = Crs::from_epsg(4674)?;
        assert!(sirgas.is_geographic());
        assert!(sirgas.is_equivalent(&Crs::WGS84));
        assert!(!Crs::from_epsg(3857)?.is_equivalent(&Crs::WGS84));
        Ok(())
    }

    #[test]
    fn test_utm_central_meridian() -> Result<(), GeometryError> {
        let utm_23s = Crs::from_epsg(32723)?;
        assert_close(
            Crs::WGS84.transformer_to(&utm_23s)?.apply(-45.0, 0.0)?,
            (500_000.0, 10_000_000.0),
            1e-3,
        );
        let utm_31n = Crs::from_epsg(32631)?;
        assert_close(
            Crs::WGS84.transformer_to(&utm_31n)?.apply(3.0, 0.0)?,
            (500_000.0, 0.0),
            1e-3,
        );
        Ok(())
    }

    #[test]
    fn test_utm_round_trip() -> Result<(), GeometryError> {
        let utm = Crs::from_epsg(31983)?;
        let forward = Crs::WGS84.transformer_to(&utm)?;
        let inverse = utm.transformer_to(&Crs::WGS84)?;
        for (lon, lat) in [(-46.63, -23.55), (-43.2, -22.9), (-47.9, -15.8), (-44.0, -2.5)] {
            let (x, y) = forward.apply(lon, lat)?;
            assert_close(inverse.apply(x, y)?, (lon, lat), 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_web_mercator() -> Result<(), GeometryError> {
        let mercator = Crs::from_epsg(3857)?;
        let (x, y) = Crs::WGS84.transformer_to(&mercator)?.apply(180.0, 0.0)?;
        assert!((x - 20_037_508.342_789_244).abs() < 1e-3, "{x}");
        assert!(y.abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn test_equivalent_systems_pass_through() -> Result<(), GeometryError> {
        let sirgas = Crs::from_epsg(4674)?;
        let transform = sirgas.transformer_to(&Crs::WGS84)?;
        assert_eq!(transform.apply(-46.0, -23.0)?, (-46.0, -23.0));
        assert_eq!(transform.target(), Crs::WGS84);
        Ok(())
    }
}

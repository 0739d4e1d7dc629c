//! The fixed catalog of archive products: their cadence, file format, data variable and
//! remote naming template.

use crate::error::MergeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MERGE_ROOT: &str = "/modelos/tempo/MERGE/GPM";
const CLIMATOLOGY_ROOT: &str = "/modelos/tempo/MERGE/GPM/CLIMATOLOGY";
const WRF_ROOT: &str = "/modelos/tempo/WRF/ams_07km/recortes/prec";

/// Temporal granularity of a product: one archive file per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Hourly,
    Daily,
    Monthly,
    Yearly,
}

impl Cadence {
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            Cadence::Hourly => "hourly",
            Cadence::Daily => "daily",
            Cadence::Monthly => "monthly",
            Cadence::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

/// Binary raster encoding of a product's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterFormat {
    Grib2,
    NetCdf,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Grib2 => "grib2",
            RasterFormat::NetCdf => "nc",
        }
    }
}

/// How a product's files are laid out on the archive server.
///
/// `template` is relative to `root` and may contain the placeholders `{yyyy}`, `{mm}`, `{dd}`,
/// `{hh}` and `{mon}` (lowercase month abbreviation) for the period timestamp, and `{ryyyy}`,
/// `{rmm}`, `{rdd}` for the forecast run date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingRule {
    pub root: &'static str,
    pub template: &'static str,
}

const DAILY_RAIN: NamingRule = NamingRule {
    root: MERGE_ROOT,
    template: "DAILY/{yyyy}/{mm}/MERGE_CPTEC_{yyyy}{mm}{dd}.grib2",
};
const DAILY_AVERAGE: NamingRule = NamingRule {
    root: CLIMATOLOGY_ROOT,
    template: "DAILY_AVERAGE/MERGE_CPTEC_12Z{dd}{mon}.nc",
};
const MONTHLY_ACCUM_YEARLY: NamingRule = NamingRule {
    root: CLIMATOLOGY_ROOT,
    template: "MONTHLY_ACCUMULATED_YEARLY/MERGE_CPTEC_acum_{mon}_{yyyy}.nc",
};
const MONTHLY_ACCUM: NamingRule = NamingRule {
    root: CLIMATOLOGY_ROOT,
    template: "MONTHLY_ACCUMULATED/MERGE_CPTEC_acum_{mon}.nc",
};
const YEARLY_ACCUM: NamingRule = NamingRule {
    root: CLIMATOLOGY_ROOT,
    template: "YEAR_ACCUMULATED/MERGE_CPTEC_acum_{yyyy}.nc",
};
const HOURLY_WRF: NamingRule = NamingRule {
    root: WRF_ROOT,
    template: "{ryyyy}/{rmm}/{rdd}/00/WRF_cpt_07KM_{ryyyy}{rmm}{rdd}00_{yyyy}{mm}{dd}{hh}.grib2",
};

/// A product published on the MERGE/CPTEC archive.
///
/// # Examples
///
/// ```
/// use merge_downloader::{Cadence, ProductType, RasterFormat};
///
/// let product: ProductType = "DAILY_RAIN".parse().unwrap();
/// assert_eq!(product, ProductType::DailyRain);
/// assert_eq!(product.cadence(), Cadence::Daily);
/// assert_eq!(product.format(), RasterFormat::Grib2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    /// Total rainfall of a single day.
    DailyRain,
    /// Accumulated rainfall of one specific month of one specific year.
    MonthlyAccumYearly,
    /// Climatological average of a calendar day (2000 onwards).
    DailyAverage,
    /// Climatological average of a calendar month's accumulation.
    MonthlyAccum,
    /// Monthly accumulation computed from daily files; not published on the archive.
    MonthlyAccumManual,
    /// Accumulated rainfall of a whole year.
    YearlyAccum,
    /// Hourly WRF 7 km precipitation forecast for one forecast run.
    HourlyWrf,
    /// Daily sum of WRF forecasts; not published on the archive.
    DailyWrf,
}

impl ProductType {
    pub const ALL: [ProductType; 8] = [
        ProductType::DailyRain,
        ProductType::MonthlyAccumYearly,
        ProductType::DailyAverage,
        ProductType::MonthlyAccum,
        ProductType::MonthlyAccumManual,
        ProductType::YearlyAccum,
        ProductType::HourlyWrf,
        ProductType::DailyWrf,
    ];

    /// The remote layout of the product, `None` for derived products that have no files of
    /// their own on the archive.
    pub fn naming_rule(&self) -> Option<&'static NamingRule> {
        match self {
            ProductType::DailyRain => Some(&DAILY_RAIN),
            ProductType::DailyAverage => Some(&DAILY_AVERAGE),
            ProductType::MonthlyAccumYearly => Some(&MONTHLY_ACCUM_YEARLY),
            ProductType::MonthlyAccum => Some(&MONTHLY_ACCUM),
            ProductType::YearlyAccum => Some(&YEARLY_ACCUM),
            ProductType::HourlyWrf => Some(&HOURLY_WRF),
            ProductType::MonthlyAccumManual | ProductType::DailyWrf => None,
        }
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            ProductType::DailyRain | ProductType::DailyAverage | ProductType::DailyWrf => {
                Cadence::Daily
            }
            ProductType::MonthlyAccumYearly
            | ProductType::MonthlyAccum
            | ProductType::MonthlyAccumManual => Cadence::Monthly,
            ProductType::YearlyAccum => Cadence::Yearly,
            ProductType::HourlyWrf => Cadence::Hourly,
        }
    }

    pub fn format(&self) -> RasterFormat {
        match self {
            ProductType::DailyRain | ProductType::HourlyWrf | ProductType::DailyWrf => {
                RasterFormat::Grib2
            }
            _ => RasterFormat::NetCdf,
        }
    }

    /// Name of the data variable inside the product's files.
    pub fn variable(&self) -> &'static str {
        match self {
            ProductType::DailyRain | ProductType::HourlyWrf | ProductType::DailyWrf => "prec",
            ProductType::DailyAverage => "pmed",
            ProductType::MonthlyAccum => "precacum",
            ProductType::MonthlyAccumYearly
            | ProductType::MonthlyAccumManual
            | ProductType::YearlyAccum => "pacum",
        }
    }

    /// Whether the product needs a forecast run date to locate its files.
    pub fn is_forecast(&self) -> bool {
        matches!(self, ProductType::HourlyWrf | ProductType::DailyWrf)
    }

    /// The canonical upper-case name, also used as the product's cache folder.
    pub fn folder_name(&self) -> &'static str {
        match self {
            ProductType::DailyRain => "DAILY_RAIN",
            ProductType::MonthlyAccumYearly => "MONTHLY_ACCUM_YEARLY",
            ProductType::DailyAverage => "DAILY_AVERAGE",
            ProductType::MonthlyAccum => "MONTHLY_ACCUM",
            ProductType::MonthlyAccumManual => "MONTHLY_ACCUM_MANUAL",
            ProductType::YearlyAccum => "YEARLY_ACCUM",
            ProductType::HourlyWrf => "HOURLY_WRF",
            ProductType::DailyWrf => "DAILY_WRF",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProductType::DailyRain => "Daily Rain",
            ProductType::MonthlyAccumYearly => "Monthly Accumulated Yearly",
            ProductType::DailyAverage => "Daily Average",
            ProductType::MonthlyAccum => "Monthly Accumulated",
            ProductType::MonthlyAccumManual => "Monthly Accumulated (computed)",
            ProductType::YearlyAccum => "Yearly Accumulated",
            ProductType::HourlyWrf => "Hourly WRF Forecast",
            ProductType::DailyWrf => "Daily WRF Forecast",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.folder_name())
    }
}

impl FromStr for ProductType {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ProductType::ALL
            .into_iter()
            .find(|product| product.folder_name() == wanted)
            .ok_or_else(|| MergeError::UnknownProduct(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_names() {
        for product in ProductType::ALL {
            let parsed: ProductType = product.folder_name().parse().unwrap();
            assert_eq!(parsed, product);
        }
        assert_eq!(
            "daily_rain".parse::<ProductType>().unwrap(),
            ProductType::DailyRain
        );
        assert!(matches!(
            "WEEKLY_RAIN".parse::<ProductType>(),
            Err(MergeError::UnknownProduct(name)) if name == "WEEKLY_RAIN"
        ));
    }

    #[test]
    fn test_derived_products_have_no_template() {
        assert!(ProductType::MonthlyAccumManual.naming_rule().is_none());
        assert!(ProductType::DailyWrf.naming_rule().is_none());
        for product in ProductType::ALL {
            if let Some(rule) = product.naming_rule() {
                assert!(rule.root.starts_with('/'));
                assert!(rule.template.ends_with(product.format().extension()));
            }
        }
    }

    #[test]
    fn test_cadence_and_format() {
        assert_eq!(ProductType::MonthlyAccum.cadence(), Cadence::Monthly);
        assert_eq!(ProductType::YearlyAccum.cadence(), Cadence::Yearly);
        assert_eq!(ProductType::HourlyWrf.cadence(), Cadence::Hourly);
        assert_eq!(ProductType::DailyAverage.format(), RasterFormat::NetCdf);
        assert_eq!(ProductType::DailyAverage.variable(), "pmed");
        assert_eq!(Cadence::Monthly.to_string(), "monthly");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ProductType::MonthlyAccumYearly).unwrap();
        assert_eq!(json, "\"MONTHLY_ACCUM_YEARLY\"");
    }
}

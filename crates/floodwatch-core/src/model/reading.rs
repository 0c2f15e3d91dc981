// ── Sensor readings and derived statuses ──
//
// A `SensorSample` is one measurement from a station. Rainfall and water
// quality statuses are either delivered directly on the channel or derived
// from the latest sample; either way each new status replaces the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::DeviceId;

/// Acceptable pH band for river water.
pub const PH_RANGE: (f64, f64) = (6.5, 8.5);
/// Turbidity above this (NTU) counts as a violation.
pub const TURBIDITY_LIMIT_NTU: f64 = 25.0;
/// Total dissolved solids above this (ppm) counts as a violation.
pub const TDS_LIMIT_PPM: f64 = 500.0;

// ── SensorSample ────────────────────────────────────────────────────

/// The most recent measurement from a device. Any field may be absent;
/// an absent field is never filled in from an older sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    /// Water level in centimetres.
    pub water_level: Option<f64>,
    /// Raw range-sensor distance to the water surface (cm).
    pub distance: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    /// NTU.
    pub turbidity: Option<f64>,
    /// ppm.
    pub tds: Option<f64>,
    /// Rainfall intensity in mm/h.
    pub rainfall: Option<f64>,
    pub rainfall_category: Option<RainfallCategory>,
    pub water_quality_category: Option<WaterQualityCategory>,
}

impl SensorSample {
    pub fn new(device_id: DeviceId, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            timestamp,
            water_level: None,
            distance: None,
            temperature: None,
            ph: None,
            turbidity: None,
            tds: None,
            rainfall: None,
            rainfall_category: None,
            water_quality_category: None,
        }
    }

    /// Rainfall status carried by this sample, if it has any rainfall data.
    pub fn rainfall_status(&self) -> Option<RainfallStatus> {
        let category = self
            .rainfall_category
            .or_else(|| self.rainfall.map(RainfallCategory::from_intensity))?;
        Some(RainfallStatus {
            device_id: self.device_id.clone(),
            category,
            intensity_mm_per_hour: self.rainfall,
            raw_value: self.rainfall,
            observed_at: self.timestamp,
        })
    }

    /// Water quality status carried by this sample, if it has any
    /// water quality data.
    pub fn water_quality_status(&self) -> Option<WaterQualityStatus> {
        let category = self
            .water_quality_category
            .or_else(|| WaterQualityCategory::assess(self.ph, self.turbidity, self.tds))?;
        Some(WaterQualityStatus {
            device_id: self.device_id.clone(),
            category,
            ph: self.ph,
            turbidity: self.turbidity,
            tds: self.tds,
            temperature: self.temperature,
            observed_at: self.timestamp,
        })
    }
}

// ── Rainfall ────────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum RainfallCategory {
    #[serde(rename = "Tidak Hujan")]
    #[strum(to_string = "Tidak Hujan", serialize = "none", serialize = "no rain")]
    TidakHujan,
    #[serde(rename = "Hujan Ringan")]
    #[strum(to_string = "Hujan Ringan", serialize = "ringan", serialize = "light")]
    Ringan,
    #[serde(rename = "Hujan Sedang")]
    #[strum(to_string = "Hujan Sedang", serialize = "sedang", serialize = "moderate")]
    Sedang,
    #[serde(rename = "Hujan Lebat")]
    #[strum(to_string = "Hujan Lebat", serialize = "lebat", serialize = "heavy")]
    Lebat,
    #[serde(rename = "Hujan Sangat Lebat")]
    #[strum(
        to_string = "Hujan Sangat Lebat",
        serialize = "sangat lebat",
        serialize = "very heavy",
        serialize = "extreme"
    )]
    SangatLebat,
}

impl RainfallCategory {
    /// Band an intensity in mm/h.
    pub fn from_intensity(mm_per_hour: f64) -> Self {
        match mm_per_hour {
            v if v < 0.5 => Self::TidakHujan,
            v if v < 5.0 => Self::Ringan,
            v if v < 10.0 => Self::Sedang,
            v if v < 20.0 => Self::Lebat,
            _ => Self::SangatLebat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallStatus {
    pub device_id: DeviceId,
    pub category: RainfallCategory,
    pub intensity_mm_per_hour: Option<f64>,
    /// Value as reported by the gauge before any banding.
    pub raw_value: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

// ── Water quality ───────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum WaterQualityCategory {
    #[strum(to_string = "Baik", serialize = "good")]
    Baik,
    #[strum(to_string = "Sedang", serialize = "fair", serialize = "moderate")]
    Sedang,
    #[strum(to_string = "Buruk", serialize = "poor", serialize = "bad")]
    Buruk,
    #[serde(rename = "Sangat Buruk")]
    #[strum(
        to_string = "Sangat Buruk",
        serialize = "very poor",
        serialize = "critical",
        serialize = "kritis"
    )]
    SangatBuruk,
}

impl WaterQualityCategory {
    /// Categories that keep a critical-water-quality alert alive.
    pub const CRITICAL: [Self; 2] = [Self::Buruk, Self::SangatBuruk];

    pub fn is_critical(self) -> bool {
        Self::CRITICAL.contains(&self)
    }

    /// Count threshold violations across the three indicators.
    ///
    /// Returns `None` when no indicator is present at all.
    pub fn assess(ph: Option<f64>, turbidity: Option<f64>, tds: Option<f64>) -> Option<Self> {
        if ph.is_none() && turbidity.is_none() && tds.is_none() {
            return None;
        }
        let violations = [
            ph.is_some_and(|v| v < PH_RANGE.0 || v > PH_RANGE.1),
            turbidity.is_some_and(|v| v > TURBIDITY_LIMIT_NTU),
            tds.is_some_and(|v| v > TDS_LIMIT_PPM),
        ]
        .into_iter()
        .filter(|v| *v)
        .count();

        Some(match violations {
            0 => Self::Baik,
            1 => Self::Sedang,
            2 => Self::Buruk,
            _ => Self::SangatBuruk,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityStatus {
    pub device_id: DeviceId,
    pub category: WaterQualityCategory,
    pub ph: Option<f64>,
    pub turbidity: Option<f64>,
    pub tds: Option<f64>,
    pub temperature: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn rainfall_bands() {
        assert_eq!(RainfallCategory::from_intensity(0.0), RainfallCategory::TidakHujan);
        assert_eq!(RainfallCategory::from_intensity(0.5), RainfallCategory::Ringan);
        assert_eq!(RainfallCategory::from_intensity(7.2), RainfallCategory::Sedang);
        assert_eq!(RainfallCategory::from_intensity(19.99), RainfallCategory::Lebat);
        assert_eq!(RainfallCategory::from_intensity(55.0), RainfallCategory::SangatLebat);
    }

    #[test]
    fn rainfall_parses_backend_and_english_labels() {
        assert_eq!(
            RainfallCategory::from_str("Hujan Sangat Lebat").ok(),
            Some(RainfallCategory::SangatLebat)
        );
        assert_eq!(RainfallCategory::from_str("light").ok(), Some(RainfallCategory::Ringan));
        assert_eq!(RainfallCategory::Lebat.to_string(), "Hujan Lebat");
    }

    #[test]
    fn water_quality_counts_violations() {
        assert_eq!(
            WaterQualityCategory::assess(Some(7.0), Some(5.0), Some(120.0)),
            Some(WaterQualityCategory::Baik)
        );
        assert_eq!(
            WaterQualityCategory::assess(Some(9.1), None, None),
            Some(WaterQualityCategory::Sedang)
        );
        assert_eq!(
            WaterQualityCategory::assess(Some(5.8), Some(40.0), None),
            Some(WaterQualityCategory::Buruk)
        );
        assert_eq!(
            WaterQualityCategory::assess(Some(5.8), Some(40.0), Some(900.0)),
            Some(WaterQualityCategory::SangatBuruk)
        );
        assert_eq!(WaterQualityCategory::assess(None, None, None), None);
    }

    #[test]
    fn critical_set() {
        assert!(!WaterQualityCategory::Baik.is_critical());
        assert!(!WaterQualityCategory::Sedang.is_critical());
        assert!(WaterQualityCategory::Buruk.is_critical());
        assert!(WaterQualityCategory::from_str("sangat buruk").is_ok_and(|c| c.is_critical()));
    }

    #[test]
    fn delivered_category_wins_over_derivation() {
        let mut sample = SensorSample::new(DeviceId::from("d"), Utc::now());
        sample.ph = Some(4.0);
        sample.turbidity = Some(90.0);
        sample.water_quality_category = Some(WaterQualityCategory::Sedang);
        let status = sample.water_quality_status().unwrap();
        assert_eq!(status.category, WaterQualityCategory::Sedang);
    }
}

//! Series definitions and their persisted form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{Bounds, Codec, NumberType};
use crate::error::{Error, Result};
use crate::partition::{PartitionPeriod, DAY_MS};

pub const MAX_SERIES_ID_LEN: usize = 128;

/// Immutable description of a series.
///
/// `min`/`max` are present exactly when `number_type` is a mapped or curved kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub number_type: NumberType,
    /// Sampling period in milliseconds.
    pub interval: i64,
    pub partition: PartitionPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl SeriesDefinition {
    pub fn new(
        id: impl Into<String>,
        number_type: NumberType,
        interval: i64,
        partition: PartitionPeriod,
    ) -> Self {
        Self {
            id: id.into(),
            number_type,
            interval,
            partition,
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Checks id, interval and bounds without touching storage.
    pub fn validate(&self) -> Result<()> {
        validate_series_id(&self.id)?;
        let invalid = |reason: String| Error::InvalidDefinition {
            id: self.id.clone(),
            reason,
        };
        if self.interval <= 0 || DAY_MS % self.interval != 0 {
            return Err(invalid(format!(
                "interval {}ms must be positive and divide one day",
                self.interval
            )));
        }
        match (self.number_type.is_bounded(), self.min, self.max) {
            (true, Some(min), Some(max)) => {
                if Bounds::new(min, max).is_none() {
                    return Err(invalid(format!("bounds [{min}, {max}] must be finite with min < max")));
                }
            }
            (true, _, _) => {
                return Err(invalid(format!("type {} requires min and max", self.number_type)));
            }
            (false, None, None) => {}
            (false, _, _) => {
                return Err(invalid(format!("type {} does not take min or max", self.number_type)));
            }
        }
        Ok(())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::new(self.min?, self.max?)
    }

    /// Codec for this series' storage kind.
    pub fn codec(&self) -> Result<Codec> {
        Codec::new(self.number_type, self.bounds()).ok_or_else(|| Error::InvalidDefinition {
            id: self.id.clone(),
            reason: format!("type {} requires valid min and max", self.number_type),
        })
    }
}

/// A definition plus its free-form metadata, as stored in `series.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFile {
    #[serde(flatten)]
    pub definition: SeriesDefinition,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SeriesFile {
    pub fn new(definition: SeriesDefinition) -> Self {
        Self {
            definition,
            metadata: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|err| {
            log::error!("failed to encode series {}: {err}", self.id());
            Error::CorruptMetadata(self.id().to_string())
        })
    }

    /// Parses `series.json` of the series stored under `id`.
    pub fn from_json(id: &str, bytes: &[u8]) -> Result<Self> {
        let file: SeriesFile = serde_json::from_slice(bytes).map_err(|err| {
            log::error!("invalid series.json for {id}: {err}");
            Error::CorruptMetadata(id.to_string())
        })?;
        if file.id() != id {
            log::error!("series.json under {id} names series {}", file.id());
            return Err(Error::CorruptMetadata(id.to_string()));
        }
        file.definition.validate()?;
        Ok(file)
    }
}

/// Ids are 1-128 characters of lowercase ASCII letters, digits, `.`, `_` and `-`.
pub fn validate_series_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SERIES_ID_LEN
        && id != "."
        && id != ".."
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSeriesId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{HOUR_MS, MINUTE_MS};

    #[test]
    fn series_ids() {
        assert!(validate_series_id("plant-3.boiler_temp").is_ok());
        assert!(validate_series_id(&"a".repeat(128)).is_ok());
        assert!(validate_series_id(&"a".repeat(129)).is_err());
        assert!(validate_series_id("").is_err());
        assert!(validate_series_id("Upper").is_err());
        assert!(validate_series_id("a/b").is_err());
        assert!(validate_series_id("..").is_err());
    }

    #[test]
    fn interval_must_divide_a_day() {
        let def = SeriesDefinition::new("s", NumberType::Int4, MINUTE_MS, PartitionPeriod::Day);
        assert!(def.validate().is_ok());
        let def = SeriesDefinition::new("s", NumberType::Int4, 7 * MINUTE_MS, PartitionPeriod::Day);
        assert!(matches!(def.validate(), Err(Error::InvalidDefinition { .. })));
        let def = SeriesDefinition::new("s", NumberType::Int4, 0, PartitionPeriod::Year);
        assert!(def.validate().is_err());
    }

    #[test]
    fn bounds_present_iff_bounded() {
        let plain = SeriesDefinition::new("s", NumberType::Float4, HOUR_MS, PartitionPeriod::Day);
        assert!(plain.validate().is_ok());
        assert!(plain.clone().with_bounds(0.0, 1.0).validate().is_err());

        let curved = SeriesDefinition::new("s", NumberType::Curved2, HOUR_MS, PartitionPeriod::Day);
        assert!(curved.validate().is_err());
        assert!(curved.codec().is_err());
        assert!(curved.clone().with_bounds(5.0, 5.0).validate().is_err());
        let curved = curved.with_bounds(-10.0, 10.0);
        assert!(curved.validate().is_ok());
        assert!(matches!(curved.codec().unwrap(), Codec::Curved(_)));
    }

    #[test]
    fn series_file_json_layout() {
        let mut file = SeriesFile::new(
            SeriesDefinition::new("hall.humidity", NumberType::Mapped1, MINUTE_MS, PartitionPeriod::Month)
                .with_bounds(0.0, 100.0),
        );
        file.metadata.insert("unit".into(), "%".into());
        let json: serde_json::Value = serde_json::from_slice(&file.to_json().unwrap()).unwrap();
        assert_eq!(json["id"], "hall.humidity");
        assert_eq!(json["type"], "MAPPED1");
        assert_eq!(json["interval"], 60_000);
        assert_eq!(json["partition"], "MONTH");
        assert_eq!(json["min"], 0.0);
        assert_eq!(json["max"], 100.0);
        assert_eq!(json["metadata"]["unit"], "%");

        let back = SeriesFile::from_json("hall.humidity", &file.to_json().unwrap()).unwrap();
        assert_eq!(back, file);
        assert!(matches!(
            SeriesFile::from_json("other", &file.to_json().unwrap()),
            Err(Error::CorruptMetadata(_))
        ));
    }

    #[test]
    fn plain_series_omit_bounds() {
        let file = SeriesFile::new(SeriesDefinition::new(
            "s",
            NumberType::Int8,
            HOUR_MS,
            PartitionPeriod::Year,
        ));
        let json: serde_json::Value = serde_json::from_slice(&file.to_json().unwrap()).unwrap();
        assert!(json.get("min").is_none());
        assert!(json["metadata"].as_object().unwrap().is_empty());
    }
}

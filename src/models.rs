//! Data models for the telemetry pipeline.
//!
//! Wire names follow the dashboard's canonical payload (`Temperature_C`,
//! `Soil_moisture_pct`, ...) so samples serialize back out in the same
//! shape the charts and the inference endpoint already understand.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

// ---

/// Growth stage of the monitored crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CropStage {
    #[serde(rename = "Initial Stage")]
    Initial,
    #[serde(rename = "Development Stage")]
    Development,
    #[default]
    #[serde(rename = "Mid stage")]
    Mid,
    #[serde(rename = "Last stage")]
    Last,
}

impl CropStage {
    pub const ALL: [CropStage; 4] = [
        CropStage::Initial,
        CropStage::Development,
        CropStage::Mid,
        CropStage::Last,
    ];

    /// Canonical label as it appears on the wire.
    pub fn label(self) -> &'static str {
        match self {
            CropStage::Initial => "Initial Stage",
            CropStage::Development => "Development Stage",
            CropStage::Mid => "Mid stage",
            CropStage::Last => "Last stage",
        }
    }

    /// Lenient label lookup. Accepts the canonical labels in any case as
    /// well as the season names used by older field datasets.
    pub fn from_label(raw: &str) -> Option<Self> {
        // ---
        match raw.trim().to_ascii_lowercase().as_str() {
            "initial stage" | "initial" => Some(CropStage::Initial),
            "development stage" | "development" => Some(CropStage::Development),
            "mid stage" | "mid" | "mid season" => Some(CropStage::Mid),
            "last stage" | "last" | "late season" => Some(CropStage::Last),
            _ => None,
        }
    }
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical telemetry record produced by the normalizer.
///
/// Every numeric field is always present; anything the payload did not
/// carry has already been defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    // ---
    /// Epoch milliseconds.
    pub ts: i64,
    #[serde(rename = "Temperature_C")]
    pub temperature_c: f64,
    #[serde(rename = "Humidity_pct")]
    pub humidity_pct: f64,
    #[serde(rename = "Soil_moisture_pct")]
    pub soil_moisture_pct: f64,
    #[serde(rename = "Reference_ET_mm")]
    pub reference_et_mm: f64,
    #[serde(rename = "Evapotranspiration_mm")]
    pub evapotranspiration_mm: f64,
    #[serde(rename = "Crop_Coefficient")]
    pub crop_coefficient: f64,
    #[serde(rename = "Crop_stage")]
    pub crop_stage: CropStage,
    #[serde(rename = "Nitrogen_mg_kg")]
    pub nitrogen_mg_kg: f64,
    #[serde(rename = "Phosphorus_mg_kg")]
    pub phosphorus_mg_kg: f64,
    #[serde(rename = "Potassium_mg_kg")]
    pub potassium_mg_kg: f64,
    #[serde(rename = "Solar_Radiation_ghi")]
    pub solar_radiation_ghi: f64,
    #[serde(rename = "Wind_Speed")]
    pub wind_speed: f64,
    #[serde(rename = "Days_planted")]
    pub days_planted: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    #[serde(rename = "Precipitation_mm")]
    pub precipitation_mm: f64,
}

/// Binary advisory outcome, carried as `0`/`1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    #[default]
    Off,
    On,
}

impl Decision {
    pub fn as_u8(self) -> u8 {
        match self {
            Decision::Off => 0,
            Decision::On => 1,
        }
    }

    pub fn is_on(self) -> bool {
        self == Decision::On
    }
}

impl From<bool> for Decision {
    fn from(on: bool) -> Self {
        if on {
            Decision::On
        } else {
            Decision::Off
        }
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // ---
        struct DecisionVisitor;

        impl Visitor<'_> for DecisionVisitor {
            type Value = Decision;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("0, 1 or a boolean")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Decision, E> {
                Ok(Decision::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decision, E> {
                match v {
                    0 => Ok(Decision::Off),
                    1 => Ok(Decision::On),
                    other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decision, E> {
                match v {
                    0 => Ok(Decision::Off),
                    1 => Ok(Decision::On),
                    other => Err(E::invalid_value(de::Unexpected::Signed(other), &self)),
                }
            }

            // numpy-backed servers sometimes emit 1.0
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decision, E> {
                if v == 0.0 {
                    Ok(Decision::Off)
                } else if v == 1.0 {
                    Ok(Decision::On)
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(DecisionVisitor)
    }
}

/// Outcome of a single provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    // ---
    #[serde(rename = "modelId")]
    pub model_id: String,
    pub irrigation: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fertilization: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<Decision>,
    /// In `[0, 1]` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Body of a predict call: the current sample plus optional context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub current: SensorSample,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Vec<SensorSample>>,
}

impl PredictionInput {
    pub fn new(current: SensorSample) -> Self {
        Self {
            current,
            window: None,
        }
    }

    pub fn with_window(mut self, window: Vec<SensorSample>) -> Self {
        self.window = Some(window);
        self
    }
}

/// Which half of an advisory pair a consumer wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Rules,
    #[serde(rename = "ai")]
    Model,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" | "rule" => Ok(Strategy::Rules),
            "ai" | "model" => Ok(Strategy::Model),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationAdvice {
    pub status: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FertilizationAdvice {
    #[serde(rename = "N")]
    pub nitrogen: String,
    #[serde(rename = "P")]
    pub phosphorus: String,
    #[serde(rename = "K")]
    pub potassium: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyAdvice {
    pub status: String,
    pub reason: String,
}

/// One strategy's advice over the three decision domains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceDetails {
    pub irrigation: IrrigationAdvice,
    pub fertilization: FertilizationAdvice,
    pub energy: EnergyAdvice,
}

/// Rule and model advice computed upstream over the same sample.
///
/// A single `ts` covers both halves, so switching strategy never mixes
/// advice from different windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryPair {
    #[serde(deserialize_with = "epoch_millis")]
    pub ts: i64,
    #[serde(default)]
    pub rules: AdviceDetails,
    #[serde(default)]
    pub ai: AdviceDetails,
}

impl AdvisoryPair {
    pub fn half(&self, strategy: Strategy) -> &AdviceDetails {
        match strategy {
            Strategy::Rules => &self.rules,
            Strategy::Model => &self.ai,
        }
    }
}

/// Accept integer or float timestamps; floats are truncated.
fn epoch_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    // ---
    let raw = f64::deserialize(deserializer)?;
    if raw.is_finite() {
        Ok(raw as i64)
    } else {
        Err(de::Error::custom("timestamp must be finite"))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_crop_stage_labels() {
        // ---
        assert_eq!(CropStage::from_label("Mid stage"), Some(CropStage::Mid));
        assert_eq!(CropStage::from_label("  initial STAGE "), Some(CropStage::Initial));
        assert_eq!(CropStage::from_label("Late Season"), Some(CropStage::Last));
        assert_eq!(CropStage::from_label("Mid Season"), Some(CropStage::Mid));
        assert_eq!(CropStage::from_label("harvest"), None);

        for stage in CropStage::ALL {
            assert_eq!(CropStage::from_label(stage.label()), Some(stage));
        }
    }

    #[test]
    fn test_decision_wire_forms() {
        // ---
        assert_eq!(serde_json::to_value(Decision::On).unwrap(), json!(1));
        assert_eq!(serde_json::from_value::<Decision>(json!(0)).unwrap(), Decision::Off);
        assert_eq!(serde_json::from_value::<Decision>(json!(true)).unwrap(), Decision::On);
        assert_eq!(serde_json::from_value::<Decision>(json!(1.0)).unwrap(), Decision::On);
        assert!(serde_json::from_value::<Decision>(json!(2)).is_err());
        assert!(serde_json::from_value::<Decision>(json!("1")).is_err());
    }

    #[test]
    fn test_prediction_omits_absent_fields() {
        // ---
        let p = Prediction {
            model_id: "rules".to_string(),
            irrigation: Decision::Off,
            fertilization: None,
            energy: None,
            confidence: Some(0.0),
            rationale: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({"modelId": "rules", "irrigation": 0, "confidence": 0.0}));
    }

    #[test]
    fn test_advisory_pair_tolerates_sparse_ai_block() {
        // ---
        // Shape published by the analyzer when inference is unavailable
        let raw = json!({
            "ts": 1_700_000_000_123.0,
            "rules": {
                "irrigation": {"status": "ON", "reason": "Soglia attiva: < 40%"},
                "energy": {"status": "OFF", "reason": "Range attivo: 18-28°C"},
                "fertilization": {"N": "LOW", "P": "OK", "K": "OK", "reason": "Soglie NPK: 50/30/100"}
            },
            "ai": {"irrigation": {"status": "OFF"}, "fertilization": {"N": "OK"}, "energy": {"status": "OFF"}},
            "config": {"moisture_threshold": 40.0},
            "settings_updated": true
        });

        let pair: AdvisoryPair = serde_json::from_value(raw).unwrap();
        assert_eq!(pair.ts, 1_700_000_000_123);
        assert_eq!(pair.half(Strategy::Rules).irrigation.status, "ON");
        assert_eq!(pair.half(Strategy::Model).irrigation.status, "OFF");
        assert_eq!(pair.half(Strategy::Model).irrigation.reason, "");
        assert_eq!(pair.half(Strategy::Model).fertilization.phosphorus, "");
    }

    #[test]
    fn test_strategy_parsing() {
        // ---
        assert_eq!("rules".parse::<Strategy>().unwrap(), Strategy::Rules);
        assert_eq!("AI".parse::<Strategy>().unwrap(), Strategy::Model);
        assert_eq!("model".parse::<Strategy>().unwrap(), Strategy::Model);
        assert!("oracle".parse::<Strategy>().is_err());
        assert_eq!(serde_json::to_value(Strategy::Model).unwrap(), json!("ai"));
    }
}

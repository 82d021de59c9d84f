//! Payload normalization.
//!
//! Stream payloads are untyped maps that may use the canonical field names,
//! any of several legacy spellings, or omit fields entirely. [`normalize`]
//! resolves each canonical field through an ordered alias list and always
//! produces a fully populated [`SensorSample`].

use serde_json::{Map, Value};

use crate::models::{CropStage, SensorSample};

// ---

/// Numeric fields of [`SensorSample`], in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Temperature,
    Humidity,
    SoilMoisture,
    ReferenceEt,
    Evapotranspiration,
    CropCoefficient,
    Nitrogen,
    Phosphorus,
    Potassium,
    SolarRadiation,
    WindSpeed,
    DaysPlanted,
    Ph,
    Precipitation,
}

/// Canonical key first, then legacy aliases in priority order.
const NUMERIC_ALIASES: &[(Field, &[&str])] = &[
    (Field::Temperature, &["Temperature_C", "temperature", "temp"]),
    (Field::Humidity, &["Humidity_pct", "humidity"]),
    (Field::SoilMoisture, &["Soil_moisture_pct", "soilMoisture"]),
    (Field::ReferenceEt, &["Reference_ET_mm", "referenceEt"]),
    (Field::Evapotranspiration, &["Evapotranspiration_mm", "evapotranspiration", "et"]),
    (Field::CropCoefficient, &["Crop_Coefficient", "kc"]),
    (Field::Nitrogen, &["Nitrogen_mg_kg", "nitrogen", "n"]),
    (Field::Phosphorus, &["Phosphorus_mg_kg", "phosphorus", "p"]),
    (Field::Potassium, &["Potassium_mg_kg", "potassium", "k"]),
    (Field::SolarRadiation, &["Solar_Radiation_ghi", "ghi", "solar"]),
    (Field::WindSpeed, &["Wind_Speed", "wind"]),
    (Field::DaysPlanted, &["Days_planted", "daysPlanted"]),
    (Field::Ph, &["pH", "ph"]),
    (Field::Precipitation, &["Precipitation_mm", "rain", "precipitation"]),
];

const CROP_STAGE_ALIASES: &[&str] = &["Crop_stage", "cropStage"];

const TIMESTAMP_ALIASES: &[&str] = &["ts", "timestamp"];

/// Build a canonical sample from an arbitrary payload.
///
/// Total: missing or malformed fields fall back to `0`, the crop stage to
/// [`CropStage::Mid`], and the timestamp to `receive_time_ms`.
pub fn normalize(payload: &Map<String, Value>, receive_time_ms: i64) -> SensorSample {
    // ---
    let num = |field: Field| -> f64 {
        NUMERIC_ALIASES
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, aliases)| first_number(payload, aliases))
            .unwrap_or(0.0)
    };

    let ts = first_number(payload, TIMESTAMP_ALIASES)
        .map(|ms| ms as i64)
        .unwrap_or(receive_time_ms);

    let crop_stage = CROP_STAGE_ALIASES
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .find_map(CropStage::from_label)
        .unwrap_or_default();

    SensorSample {
        ts,
        temperature_c: num(Field::Temperature),
        humidity_pct: num(Field::Humidity),
        soil_moisture_pct: num(Field::SoilMoisture),
        reference_et_mm: num(Field::ReferenceEt),
        evapotranspiration_mm: num(Field::Evapotranspiration),
        crop_coefficient: num(Field::CropCoefficient),
        crop_stage,
        nitrogen_mg_kg: num(Field::Nitrogen),
        phosphorus_mg_kg: num(Field::Phosphorus),
        potassium_mg_kg: num(Field::Potassium),
        solar_radiation_ghi: num(Field::SolarRadiation),
        wind_speed: num(Field::WindSpeed),
        days_planted: num(Field::DaysPlanted),
        ph: num(Field::Ph),
        precipitation_mm: num(Field::Precipitation),
    }
}

/// Same as [`normalize`] for a payload of unknown shape. Anything other
/// than a JSON object is treated as an empty map.
pub fn normalize_value(payload: &Value, receive_time_ms: i64) -> SensorSample {
    // ---
    match payload {
        Value::Object(map) => normalize(map, receive_time_ms),
        _ => normalize(&Map::new(), receive_time_ms),
    }
}

fn first_number(payload: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(coerce_number)
}

/// Numbers pass through; strings count only when they parse to a finite value.
fn coerce_number(value: &Value) -> Option<f64> {
    // ---
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

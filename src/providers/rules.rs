//! Closed-form water and nutrient balance. No I/O.

use async_trait::async_trait;

use super::AdvisoryProvider;
use crate::error::PredictError;
use crate::models::{Decision, Prediction, PredictionInput, SensorSample};

// ---

/// Water deficit (mm) above which irrigation is considered.
const DEFICIT_TRIGGER_MM: f64 = 0.5;

/// Soil moisture (%) below which the soil counts as dry.
const DRY_SOIL_PCT: f64 = 30.0;

const DRY_SOIL_BONUS: f64 = 0.3;

/// Nutrient and climate thresholds for the fertilization and energy rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    pub nitrogen_min_mg_kg: f64,
    pub phosphorus_min_mg_kg: f64,
    pub potassium_min_mg_kg: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            nitrogen_min_mg_kg: 50.0,
            phosphorus_min_mg_kg: 30.0,
            potassium_min_mg_kg: 100.0,
            temp_min_c: 15.0,
            temp_max_c: 30.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedProvider {
    thresholds: RuleThresholds,
}

impl RuleBasedProvider {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Synchronous core of [`AdvisoryProvider::predict`].
    pub fn evaluate(&self, s: &SensorSample) -> Prediction {
        // ---
        let etc = s.crop_coefficient * s.reference_et_mm;
        let deficit = (etc - s.precipitation_mm).max(0.0);
        let dry = s.soil_moisture_pct < DRY_SOIL_PCT;
        let irrigate = deficit > DEFICIT_TRIGGER_MM && dry;

        let confidence = if irrigate {
            let bonus = if dry { DRY_SOIL_BONUS } else { 0.0 };
            (deficit / 10.0 + bonus).min(1.0)
        } else {
            0.0
        };

        let t = &self.thresholds;
        let fertilize = s.nitrogen_mg_kg < t.nitrogen_min_mg_kg
            || s.phosphorus_mg_kg < t.phosphorus_min_mg_kg
            || s.potassium_mg_kg < t.potassium_min_mg_kg;
        let climate = s.temperature_c < t.temp_min_c || s.temperature_c > t.temp_max_c;

        Prediction {
            model_id: self.id().to_string(),
            irrigation: Decision::from(irrigate),
            fertilization: Some(Decision::from(fertilize)),
            energy: Some(Decision::from(climate)),
            confidence: Some(confidence),
            rationale: Some(format!(
                "ETc={:.2}mm, Rain={:.2}mm, Deficit={:.2}mm, Soil={}%",
                etc, s.precipitation_mm, deficit, s.soil_moisture_pct
            )),
        }
    }
}

#[async_trait]
impl AdvisoryProvider for RuleBasedProvider {
    fn id(&self) -> &str {
        "rules"
    }

    fn name(&self) -> &str {
        "Rule Based Suggestion"
    }

    fn description(&self) -> &str {
        "operational suggestion based on shared standards"
    }

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictError> {
        Ok(self.evaluate(&input.current))
    }
}

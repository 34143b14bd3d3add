//! Core data model: simulation inputs, derived results, and saved scenarios.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Horizon used when the caller omits `time_horizon_months` or sends garbage.
pub const DEFAULT_TIME_HORIZON_MONTHS: f64 = 36.0;

/// Prefix that marks a client-issued identifier on the wire.
const LOCAL_ID_PREFIX: &str = "local-";

/// User-controlled simulation parameters.
///
/// Deserialization never fails on a JSON value: any field that is missing or
/// not numeric falls back to 0 (36 for the horizon). Values are kept as given,
/// negatives included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct SimulationInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    pub monthly_invoice_volume: f64,
    pub num_ap_staff: f64,
    pub avg_hours_per_invoice: f64,
    pub hourly_wage: f64,
    /// Percentage (0-100), not a fraction.
    pub error_rate_manual: f64,
    pub error_cost: f64,
    pub time_horizon_months: f64,
    pub one_time_implementation_cost: f64,
}

impl Default for SimulationInput {
    /// Coerced form of an empty payload.
    fn default() -> Self {
        Self {
            scenario_name: None,
            monthly_invoice_volume: 0.0,
            num_ap_staff: 0.0,
            avg_hours_per_invoice: 0.0,
            hourly_wage: 0.0,
            error_rate_manual: 0.0,
            error_cost: 0.0,
            time_horizon_months: DEFAULT_TIME_HORIZON_MONTHS,
            one_time_implementation_cost: 0.0,
        }
    }
}

impl SimulationInput {
    /// Starting parameters offered to a new user (mid-size AP team).
    pub fn starter() -> Self {
        Self {
            scenario_name: None,
            monthly_invoice_volume: 2000.0,
            num_ap_staff: 3.0,
            avg_hours_per_invoice: 0.1667, // ~10 minutes
            hourly_wage: 30.0,
            error_rate_manual: 0.5,
            error_cost: 100.0,
            time_horizon_months: 36.0,
            one_time_implementation_cost: 50_000.0,
        }
    }

    /// Names of the fields that make this input unfit to be saved.
    ///
    /// Live previews never call this; only explicit saves do.
    pub fn save_violations(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.monthly_invoice_volume < 1.0 {
            fields.push("monthly_invoice_volume");
        }
        if self.hourly_wage <= 0.0 {
            fields.push("hourly_wage");
        }
        if self.time_horizon_months < 1.0 {
            fields.push("time_horizon_months");
        }
        fields
    }

    /// Copy with every non-finite field replaced by its default
    /// (0, or 36 for the horizon).
    pub fn sanitized(&self) -> Self {
        let finite = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        Self {
            scenario_name: self.scenario_name.clone(),
            monthly_invoice_volume: finite(self.monthly_invoice_volume, 0.0),
            num_ap_staff: finite(self.num_ap_staff, 0.0),
            avg_hours_per_invoice: finite(self.avg_hours_per_invoice, 0.0),
            hourly_wage: finite(self.hourly_wage, 0.0),
            error_rate_manual: finite(self.error_rate_manual, 0.0),
            error_cost: finite(self.error_cost, 0.0),
            time_horizon_months: finite(self.time_horizon_months, DEFAULT_TIME_HORIZON_MONTHS),
            one_time_implementation_cost: finite(self.one_time_implementation_cost, 0.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.monthly_invoice_volume,
            self.num_ap_staff,
            self.avg_hours_per_invoice,
            self.hourly_wage,
            self.error_rate_manual,
            self.error_cost,
            self.time_horizon_months,
            self.one_time_implementation_cost,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Display label: the scenario name if it has one.
    pub fn label(&self) -> Option<&str> {
        self.scenario_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl From<Value> for SimulationInput {
    fn from(value: Value) -> Self {
        let field = |key: &str| value.get(key).unwrap_or(&Value::Null);
        Self {
            scenario_name: coerce_text(field("scenario_name")),
            monthly_invoice_volume: coerce_number(field("monthly_invoice_volume"), 0.0),
            num_ap_staff: coerce_number(field("num_ap_staff"), 0.0),
            avg_hours_per_invoice: coerce_number(field("avg_hours_per_invoice"), 0.0),
            hourly_wage: coerce_number(field("hourly_wage"), 0.0),
            error_rate_manual: coerce_number(field("error_rate_manual"), 0.0),
            error_cost: coerce_number(field("error_cost"), 0.0),
            time_horizon_months: coerce_number(
                field("time_horizon_months"),
                DEFAULT_TIME_HORIZON_MONTHS,
            ),
            one_time_implementation_cost: coerce_number(
                field("one_time_implementation_cost"),
                0.0,
            ),
        }
    }
}

/// Numeric coercion used at every input boundary.
///
/// Numbers and numeric strings are accepted; a blank string reads as 0.
/// Everything else, and any non-finite result, yields `fallback`.
pub fn coerce_number(value: &Value, fallback: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(fallback)
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Model constants recorded on every result, so a number can be traced back
/// to the model version that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ModelConstants {
    pub AUTOMATED_COST_PER_INVOICE: f64,
    pub ERROR_RATE_AUTO: f64,
    pub TIME_SAVED_PER_INVOICE_MIN: f64,
    pub MIN_ROI_BOOST: f64,
}

/// Derived financial metrics. Always produced by [`crate::simulation::simulate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub inputs: SimulationInput,
    pub constants: ModelConstants,
    pub labor_cost_manual: f64,
    pub auto_cost: f64,
    pub error_savings: f64,
    pub monthly_savings: f64,
    pub cumulative_savings: f64,
    pub net_savings: f64,
    pub payback_months: Option<f64>,
    pub roi_percentage: Option<f64>,
    pub time_horizon_months: f64,
}

impl SimulationResult {
    /// True when every number survives a JSON round trip (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        let figures = [
            self.labor_cost_manual,
            self.auto_cost,
            self.error_savings,
            self.monthly_savings,
            self.cumulative_savings,
            self.net_savings,
            self.payback_months.unwrap_or(0.0),
            self.roi_percentage.unwrap_or(0.0),
            self.time_horizon_months,
        ];
        self.inputs.is_finite() && figures.iter().all(|v| v.is_finite())
    }
}

/// Identifier of a saved scenario.
///
/// Durable ids are issued by the backing store; local ids are minted by the
/// client-side fallback cache. The variants never compare equal, and the wire
/// form keeps them apart: local ids carry the `local-` prefix, durable ids are
/// bare UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    Durable(String),
    Local(String),
}

impl ScenarioId {
    pub fn mint_durable() -> Self {
        ScenarioId::Durable(Uuid::new_v4().to_string())
    }

    pub fn mint_local() -> Self {
        ScenarioId::Local(Uuid::new_v4().to_string())
    }

    /// Parse the wire form produced by `Display`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix(LOCAL_ID_PREFIX) {
            Some(rest) => ScenarioId::Local(rest.to_string()),
            None => ScenarioId::Durable(raw.to_string()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ScenarioId::Local(_))
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioId::Durable(id) => f.write_str(id),
            ScenarioId::Local(id) => write!(f, "{LOCAL_ID_PREFIX}{id}"),
        }
    }
}

impl Serialize for ScenarioId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScenarioId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ScenarioId::parse(&raw))
    }
}

/// A scenario that has not been persisted yet; the backend assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDraft {
    pub input: SimulationInput,
    pub result: SimulationResult,
    pub created_at: DateTime<Utc>,
}

impl ScenarioDraft {
    pub fn into_scenario(self, id: ScenarioId) -> Scenario {
        Scenario {
            id,
            input: self.input,
            result: self.result,
            created_at: self.created_at,
        }
    }
}

/// A saved snapshot of one input and the result computed from it.
///
/// On the wire a scenario is one flat document: the input fields, the result
/// fields, `_id` and `createdAt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: ScenarioId,
    pub input: SimulationInput,
    pub result: SimulationResult,
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        for part in [to_object(&self.input), to_object(&self.result)] {
            doc.extend(part);
        }
        doc.insert("_id".to_string(), Value::String(self.id.to_string()));
        doc.insert(
            "createdAt".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        Value::Object(doc)
    }

    pub fn from_document(doc: Value) -> Result<Self, String> {
        let id = doc
            .get("_id")
            .and_then(|v| match v {
                Value::String(s) => Some(ScenarioId::parse(s)),
                Value::Number(n) => Some(ScenarioId::parse(&n.to_string())),
                _ => None,
            })
            .ok_or_else(|| "scenario document has no _id".to_string())?;
        let created_at = doc
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| format!("scenario {id} has no valid createdAt"))?;
        let result = serde_json::from_value::<SimulationResult>(doc.clone())
            .map_err(|e| format!("scenario {id} has malformed result fields: {e}"))?;
        let input = SimulationInput::from(doc);

        Ok(Self {
            id,
            input,
            result,
            created_at,
        })
    }

    /// Display label used in listings and comparisons.
    pub fn label(&self) -> String {
        self.input
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl Serialize for Scenario {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Scenario {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Value::deserialize(deserializer)?;
        Scenario::from_document(doc).map_err(serde::de::Error::custom)
    }
}

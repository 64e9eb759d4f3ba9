//! Typed payloads exchanged with the monitoring backend.
//!
//! The backend is loose about shapes (numbers as strings, renamed keys,
//! activity as either objects or plain strings). Every field that may be
//! absent is an `Option` or carries a serde default so a partial payload still
//! decodes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Event confidence as sent by the backend: a number or a numeric string.
///
/// Values below 1.0 are fractional; see [`Confidence::percent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Wrap a raw value; non-finite input becomes 0.
    pub fn new(value: f64) -> Self {
        Self(if value.is_finite() { value } else { 0.0 })
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Percentage form: fractional values (< 1.0) are scaled by 100.
    pub fn percent(self) -> f64 {
        if self.0 < 1.0 { self.0 * 100.0 } else { self.0 }
    }

    /// One-decimal percentage string (`0.85` -> `"85.0"`).
    pub fn display(self) -> String {
        format!("{:.1}", self.percent())
    }

    fn parse(text: &str) -> Self {
        Self::new(text.trim().parse::<f64>().unwrap_or(0.0))
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match FlexNumber::deserialize(deserializer)? {
            FlexNumber::Number(value) => Self::new(value),
            FlexNumber::Text(text) => Self::parse(&text),
            FlexNumber::Null => Self::default(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Number(f64),
    Text(String),
    Null,
}

fn flex_f64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<FlexNumber>::deserialize(deserializer)? {
        Some(FlexNumber::Number(value)) => Some(value),
        Some(FlexNumber::Text(text)) => text.trim().parse().ok(),
        Some(FlexNumber::Null) | None => None,
    }
    .filter(|value: &f64| value.is_finite()))
}

/// Sky position attached to some predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub ra: f64,
    pub dec: f64,
}

/// One predicted astronomical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub confidence: Confidence,
    /// ISO-8601 timestamp of the event (or of the last simulated scan).
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Produced by the simulator rather than the backend.
    #[serde(skip)]
    pub synthetic: bool,
}

impl Prediction {
    /// Placeholder event some backends emit before the first model run.
    pub const PLACEHOLDER_EVENT: &'static str = "System Initialized";

    pub fn is_placeholder(&self) -> bool {
        self.event == Self::PLACEHOLDER_EVENT
    }

    /// Injected through the synthetic upload path.
    pub fn is_synthetic_injection(&self) -> bool {
        self.data_source.as_deref() == Some("SYNTHETIC") || self.event.contains("SYNTHETIC")
    }
}

/// Ingestion state of a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Downloaded,
    Processed,
    Ready,
    /// Also covers status strings this client does not know.
    #[default]
    #[serde(other)]
    Pending,
}

/// Dataset card payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: DatasetStatus,
    #[serde(default = "default_size")]
    pub size: String,
}

fn default_size() -> String {
    "0 B".to_string()
}

impl Dataset {
    /// Stand-in for a dataset key the backend did not report.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DatasetStatus::Pending,
            size: default_size(),
        }
    }
}

/// Dataset key -> dataset, as returned by `/api/datasets/status`.
pub type Datasets = BTreeMap<String, Dataset>;

/// State of one pipeline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ready,
    Running,
    Completed,
    #[default]
    #[serde(other)]
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u32>,
    #[serde(
        default,
        deserialize_with = "flex_f64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub loss: Option<f64>,
}

impl PipelineStep {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            progress: 0.0,
            epoch: None,
            loss: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    #[serde(default)]
    pub training_accuracy: f64,
    #[serde(default)]
    pub system_load: f64,
    #[serde(default = "default_model_loss")]
    pub model_loss: f64,
    #[serde(default = "default_inference_time")]
    pub inference_time: f64,
}

fn default_model_loss() -> f64 {
    0.15
}

fn default_inference_time() -> f64 {
    45.0
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            training_accuracy: 0.0,
            system_load: 0.0,
            model_loss: default_model_loss(),
            inference_time: default_inference_time(),
        }
    }
}

/// `/api/pipeline/status` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatus {
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
    #[serde(default)]
    pub metrics: PipelineMetrics,
}

/// One line of the profile activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ActivityWire")]
pub struct Activity {
    pub time: String,
    pub action: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActivityWire {
    Entry {
        #[serde(default)]
        time: String,
        #[serde(default)]
        action: String,
    },
    Text(String),
}

impl From<ActivityWire> for Activity {
    fn from(wire: ActivityWire) -> Self {
        match wire {
            ActivityWire::Entry { time, action } => Self { time, action },
            ActivityWire::Text(action) => Self {
                time: String::new(),
                action,
            },
        }
    }
}

/// `/api/user/stats` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub clearance: Option<String>,
    #[serde(default, alias = "joined")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub recent_activity: Vec<Activity>,
}

/// One Live Earth carousel frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarthSource {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub name: String,
    pub ra: f64,
    pub dec: f64,
    #[serde(default)]
    pub magnitude: f64,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

/// `/api/stars` wraps its list in an object.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StarsEnvelope {
    #[serde(default)]
    pub stars: Vec<Star>,
}

/// One GOES X-ray flux sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarReading {
    #[serde(default)]
    pub energy: String,
    pub flux: f64,
    #[serde(default)]
    pub time_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub news_site: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// `/api/chat` reply.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatReplyWire {
    #[serde(default)]
    pub response: String,
}

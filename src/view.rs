//! Display-ready projections of dashboard state.
//!
//! Nothing here renders markup. Each function turns a state slice into the
//! strings and tones a panel would show, so any frontend (terminal, egui,
//! web) shares the same sorting, normalization, and fallbacks.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::model::{Dataset, DatasetStatus, NewsItem, Prediction, UserProfile};

/// Semantic color of a status element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Green: healthy or high confidence.
    Nominal,
    /// Yellow: degraded or scanning.
    Warning,
    /// Red: failure or low confidence.
    Critical,
    /// Grey: offline or idle.
    Muted,
    Cyan,
    Purple,
    Blue,
    Amber,
    Saffron,
}

/// Status text plus its tone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readout {
    pub text: String,
    pub tone: Tone,
}

impl Readout {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Offset used to show times; local when the platform reports it.
pub fn display_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Parse an RFC 3339 timestamp and format it as `HH:MM:SS` in `offset`.
pub fn clock_time(timestamp: &str, offset: UtcOffset) -> Option<String> {
    let parsed = OffsetDateTime::parse(timestamp.trim(), &Rfc3339).ok()?;
    parsed
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]:[second]"))
        .ok()
}

/// Like [`clock_time`] but without seconds.
pub fn clock_minutes(timestamp: &str, offset: UtcOffset) -> Option<String> {
    let parsed = OffsetDateTime::parse(timestamp.trim(), &Rfc3339).ok()?;
    parsed
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]"))
        .ok()
}

/// Text shown when the predictions list is empty.
pub const EMPTY_PREDICTIONS: &str = "Scanning deep space sector...";

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub name: String,
    /// Normalized percentage with one decimal.
    pub confidence: String,
    pub tone: Tone,
    /// `T+HH:MM:SS`, or `T+--:--:--` for an unreadable timestamp.
    pub clock: String,
}

/// Sort descending by confidence and project each prediction to a row.
///
/// The sort is stable and leaves the caller's slice untouched.
pub fn prediction_rows(predictions: &[Prediction], offset: UtcOffset) -> Vec<PredictionRow> {
    let mut sorted: Vec<&Prediction> = predictions.iter().collect();
    sorted.sort_by(|a, b| b.confidence.value().total_cmp(&a.confidence.value()));
    sorted
        .into_iter()
        .map(|prediction| {
            let percent = prediction.confidence.percent();
            PredictionRow {
                name: display_event(&prediction.event).to_uppercase(),
                confidence: prediction.confidence.display(),
                tone: confidence_tone(percent),
                clock: format!(
                    "T+{}",
                    clock_time(&prediction.timestamp, offset).unwrap_or_else(|| "--:--:--".into())
                ),
            }
        })
        .collect()
}

/// Green at 80 and above, yellow from 60, red below.
pub fn confidence_tone(percent: f64) -> Tone {
    if percent < 60.0 {
        Tone::Critical
    } else if percent < 80.0 {
        Tone::Warning
    } else {
        Tone::Nominal
    }
}

fn display_event(event: &str) -> &str {
    match event {
        "Unknown Anomaly" => "Unidentified Signal",
        "Planet Crossing" => "Exoplanet Transit",
        other => other,
    }
}

/// Dataset keys shown as cards, with their fallback display names.
pub const DATASET_CARDS: [(&str, &str); 4] = [
    ("ztf", "ZTF"),
    ("tess", "TESS"),
    ("mast", "MAST"),
    ("sim", "Simulation"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetCard {
    pub key: String,
    pub name: String,
    pub status: String,
    pub tone: Tone,
    pub size: String,
    /// Progress bar fill, 0 to 100.
    pub progress: u8,
    pub action: &'static str,
    pub action_enabled: bool,
}

/// Card for `key`; a missing dataset shows as pending with `0 B`.
pub fn dataset_card(key: &str, dataset: Option<&Dataset>) -> DatasetCard {
    let fallback_name = DATASET_CARDS
        .iter()
        .find(|(card_key, _)| *card_key == key)
        .map_or(key, |(_, name)| *name);
    let dataset = dataset
        .cloned()
        .unwrap_or_else(|| Dataset::placeholder(fallback_name));
    let (tone, progress) = match dataset.status {
        DatasetStatus::Pending => (Tone::Muted, 0),
        DatasetStatus::Downloaded => (Tone::Cyan, 50),
        DatasetStatus::Processed => (Tone::Purple, 100),
        DatasetStatus::Ready => (Tone::Nominal, 100),
    };
    DatasetCard {
        key: key.to_string(),
        name: dataset.name,
        status: status_label(dataset.status).to_uppercase(),
        tone,
        size: dataset.size,
        progress,
        action: if dataset.status == DatasetStatus::Pending {
            "Ingest Stream"
        } else {
            "Reprocess"
        },
        action_enabled: dataset.status != DatasetStatus::Processed,
    }
}

/// Compact stream status used on the data-streams page.
pub fn dataset_stream_status(dataset: Option<&Dataset>) -> Readout {
    let Some(dataset) = dataset else {
        return Readout::new("CONNECTING...", Tone::Muted);
    };
    match dataset.status {
        DatasetStatus::Downloaded => Readout::new(format!("{} [LIVE STREAM]", dataset.size), Tone::Nominal),
        DatasetStatus::Processed => Readout::new(format!("{} [PROCESSED]", dataset.size), Tone::Nominal),
        other => Readout::new(
            format!("{} [{}]", dataset.size, status_label(other).to_uppercase()),
            Tone::Muted,
        ),
    }
}

fn status_label(status: DatasetStatus) -> &'static str {
    match status {
        DatasetStatus::Pending => "pending",
        DatasetStatus::Downloaded => "downloaded",
        DatasetStatus::Processed => "processed",
        DatasetStatus::Ready => "ready",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub name: String,
    pub rank: String,
    pub clearance: String,
    /// `YYYY-MM-DD`, when the backend sent a readable date.
    pub joined: Option<String>,
    pub activity: Vec<String>,
}

pub fn profile_view(user: &UserProfile) -> ProfileView {
    ProfileView {
        name: user
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("UNIDENTIFIED")
            .to_uppercase(),
        rank: user.rank.clone().unwrap_or_else(|| "CADET".into()),
        clearance: user.clearance.clone().unwrap_or_else(|| "LEVEL 1".into()),
        joined: user
            .created_at
            .as_deref()
            .map(|date| date.get(..10).unwrap_or(date).to_string()),
        activity: user
            .recent_activity
            .iter()
            .map(|entry| {
                if entry.time.is_empty() {
                    entry.action.clone()
                } else {
                    format!("{} {}", entry.time, entry.action)
                }
            })
            .collect(),
    }
}

/// Text shown when the news feed is empty.
pub const EMPTY_NEWS: &str = "No active feeds.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsRow {
    pub title: String,
    pub site: String,
    pub url: String,
    pub accent: Tone,
    pub clock: String,
}

pub fn news_rows(items: &[NewsItem], offset: UtcOffset) -> Vec<NewsRow> {
    items
        .iter()
        .map(|item| NewsRow {
            title: item.title.clone(),
            site: item.news_site.clone(),
            url: item.url.clone(),
            accent: news_accent(item),
            clock: clock_minutes(&item.published_at, offset).unwrap_or_default(),
        })
        .collect()
}

/// Agency accent; later rules override earlier ones.
fn news_accent(item: &NewsItem) -> Tone {
    let site = item.news_site.as_str();
    let title = item.title.as_str();
    let rules: [(bool, Tone); 7] = [
        (
            site.contains("ISRO") || title.contains("ISRO") || title.contains("India"),
            Tone::Saffron,
        ),
        (site.contains("JAXA"), Tone::Critical),
        (site.contains("CNSA") || title.contains("China"), Tone::Critical),
        (site.contains("SpaceNews"), Tone::Amber),
        (site.contains("NASA"), Tone::Blue),
        (site.contains("ESA"), Tone::Blue),
        (site.contains("Ars Technica"), Tone::Nominal),
    ];
    rules
        .into_iter()
        .filter(|(matched, _)| *matched)
        .map(|(_, tone)| tone)
        .last()
        .unwrap_or(Tone::Blue)
}

/// Synthetic-injection panel: last injected event and the injector state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticPanel {
    pub last_event: Readout,
    pub status: Readout,
}

pub fn synthetic_panel(predictions: &[Prediction]) -> SyntheticPanel {
    match predictions.iter().find(|p| p.is_synthetic_injection()) {
        Some(prediction) => {
            let event = if prediction.event.is_empty() {
                "UNKNOWN"
            } else {
                prediction
                    .event
                    .strip_prefix("SYNTHETIC: ")
                    .unwrap_or(&prediction.event)
            };
            SyntheticPanel {
                last_event: Readout::new(event.to_uppercase(), Tone::Cyan),
                status: Readout::new("ACTIVE", Tone::Nominal),
            }
        }
        None => SyntheticPanel {
            last_event: Readout::new("NONE", Tone::Muted),
            status: Readout::new("READY", Tone::Muted),
        },
    }
}

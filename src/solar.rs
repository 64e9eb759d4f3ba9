//! Solar X-ray flux readout and chart series.

use serde_json::Value;
use time::UtcOffset;

use crate::api::FetchResult;
use crate::model::SolarReading;
use crate::view::{Readout, Tone, clock_minutes};

/// Points kept on the flux chart.
pub const SERIES_POINTS: usize = 30;
/// Preferred GOES channel (long wavelength band).
pub const LONG_CHANNEL: &str = "0.1-0.8";

const ERROR_READOUT_CHARS: usize = 20;

/// One chart point.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarPoint {
    /// `HH:MM` label in the display offset; empty when the tag is unparseable.
    pub label: String,
    pub flux: f64,
}

/// Readout plus the chart it summarizes.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarPanel {
    readout: Readout,
    series: Vec<SolarPoint>,
}

impl Default for SolarPanel {
    fn default() -> Self {
        Self {
            readout: Readout::new("", Tone::Muted),
            series: Vec::new(),
        }
    }
}

impl SolarPanel {
    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    pub fn series(&self) -> &[SolarPoint] {
        &self.series
    }

    /// Apply the result of `GET /api/solar/flux`.
    ///
    /// Returns true when the chart series was replaced.
    pub fn apply(&mut self, result: &FetchResult, offset: UtcOffset) -> bool {
        let current = self.readout.text.trim().to_lowercase();
        if current.is_empty() || current.contains("initializing") {
            self.readout = Readout::new("SCANNING...", Tone::Warning);
        }
        let reply = match result {
            Ok(reply) if reply.is_ok() => reply,
            Ok(reply) => {
                tracing::warn!(status = reply.status, "Solar flux returned non-OK status");
                self.readout = Readout::new("OFFLINE", Tone::Muted);
                return false;
            }
            Err(err) => {
                tracing::warn!("Solar flux fetch failed: {err}");
                self.readout = Readout::new("OFFLINE", Tone::Muted);
                return false;
            }
        };
        let payload: Value = match reply.json() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("Solar API JSON parse error: {err}");
                return false;
            }
        };
        let items = match payload.as_array() {
            Some(items) if !items.is_empty() => items,
            _ => {
                tracing::warn!("Solar data unexpected format");
                self.readout = Readout::new("DATA CORRUPT", Tone::Critical);
                return false;
            }
        };
        if let Some(error) = items[0].get("error").and_then(error_text) {
            let text: String = error
                .replace("NASA API Error", "API ERR")
                .chars()
                .take(ERROR_READOUT_CHARS)
                .collect();
            self.readout = Readout::new(text.to_uppercase(), Tone::Critical);
            return false;
        }
        self.apply_readings(items, offset)
    }

    fn apply_readings(&mut self, items: &[Value], offset: UtcOffset) -> bool {
        let readings: Vec<SolarReading> = items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect();
        let preferred: Vec<&SolarReading> = readings
            .iter()
            .filter(|reading| reading.energy.trim().contains(LONG_CHANNEL))
            .collect();
        let chosen = if preferred.is_empty() {
            if !readings.is_empty() {
                tracing::warn!("Preferred solar channel not found, using all readings");
            }
            readings.iter().collect()
        } else {
            preferred
        };
        let Some(latest) = chosen.last() else {
            self.readout = Readout::new("NO SIGNAL (Low Flux)", Tone::Critical);
            return false;
        };
        self.readout = Readout::new(
            format!("LIVE FLUX: {} W/m²", to_exponential(latest.flux, 2)),
            Tone::Purple,
        );
        let skip = chosen.len().saturating_sub(SERIES_POINTS);
        self.series = chosen[skip..]
            .iter()
            .map(|reading| SolarPoint {
                label: clock_minutes(&reading.time_tag, offset).unwrap_or_default(),
                flux: reading.flux,
            })
            .collect();
        true
    }
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Scientific notation with an explicit exponent sign, e.g. `1.23e-6`, `4.00e+0`.
pub fn to_exponential(value: f64, digits: usize) -> String {
    let formatted = format!("{value:.digits$e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpReply, TransportError};
    use serde_json::json;

    fn reply(value: Value) -> FetchResult {
        Ok(HttpReply::ok(serde_json::to_vec(&value).unwrap()))
    }

    fn reading(energy: &str, flux: f64, minute: u32) -> Value {
        json!({
            "energy": energy,
            "flux": flux,
            "time_tag": format!("2024-05-10T12:{minute:02}:00Z"),
        })
    }

    #[test]
    fn exponential_matches_js_formatting() {
        assert_eq!(to_exponential(0.000001234, 2), "1.23e-6");
        assert_eq!(to_exponential(4.0, 2), "4.00e+0");
        assert_eq!(to_exponential(12345.0, 2), "1.23e+4");
    }

    #[test]
    fn error_element_is_shortened() {
        let mut panel = SolarPanel::default();
        let changed = panel.apply(
            &reply(json!([{"error": "NASA API Error: rate limit exceeded"}])),
            UtcOffset::UTC,
        );
        assert!(!changed);
        assert_eq!(panel.readout().text, "API ERR: RATE LIMIT ");
        assert_eq!(panel.readout().tone, Tone::Critical);
    }

    #[test]
    fn prefers_long_channel_and_keeps_last_thirty() {
        let mut items: Vec<Value> = (0..40).map(|m| reading("0.1-0.8nm", 1e-6 * f64::from(m + 1), m)).collect();
        items.push(reading("0.05-0.4nm", 9.9e-3, 59));
        let mut panel = SolarPanel::default();
        assert!(panel.apply(&reply(Value::Array(items)), UtcOffset::UTC));
        assert_eq!(panel.readout().text, "LIVE FLUX: 4.00e-5 W/m²");
        assert_eq!(panel.series().len(), SERIES_POINTS);
        assert_eq!(panel.series()[0].label, "12:10");
        assert_eq!(panel.series().last().unwrap().label, "12:39");
    }

    #[test]
    fn falls_back_to_all_readings() {
        let mut panel = SolarPanel::default();
        panel.apply(&reply(json!([reading("0.05-0.4nm", 2.5e-7, 1)])), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "LIVE FLUX: 2.50e-7 W/m²");
        assert_eq!(panel.readout().tone, Tone::Purple);
    }

    #[test]
    fn unusable_payloads() {
        let mut panel = SolarPanel::default();
        panel.apply(&reply(json!([{"energy": "0.1-0.8nm"}])), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "NO SIGNAL (Low Flux)");

        panel.apply(&reply(json!({"flux": 1.0})), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "DATA CORRUPT");

        panel.apply(&reply(json!([])), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "DATA CORRUPT");
    }

    #[test]
    fn failures_and_parse_errors() {
        let mut panel = SolarPanel::default();
        panel.apply(&Ok(HttpReply::with_status(500, "boom")), UtcOffset::UTC);
        assert_eq!(panel.readout(), &Readout::new("OFFLINE", Tone::Muted));

        panel.apply(&Err(TransportError::Transport("refused".into())), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "OFFLINE");

        // parse failures leave the readout alone
        panel.apply(&Ok(HttpReply::ok("not json")), UtcOffset::UTC);
        assert_eq!(panel.readout().text, "OFFLINE");
    }

    #[test]
    fn initializing_readout_moves_to_scanning() {
        let mut panel = SolarPanel {
            readout: Readout::new("Initializing sensors...", Tone::Muted),
            series: Vec::new(),
        };
        panel.apply(&Ok(HttpReply::ok("{")), UtcOffset::UTC);
        assert_eq!(panel.readout(), &Readout::new("SCANNING...", Tone::Warning));
    }

    #[test]
    fn empty_readout_shows_scanning_first() {
        let mut panel = SolarPanel::default();
        panel.apply(&Ok(HttpReply::ok("{")), UtcOffset::UTC);
        assert_eq!(panel.readout(), &Readout::new("SCANNING...", Tone::Warning));
    }
}

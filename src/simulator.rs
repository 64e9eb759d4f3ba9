//! Confidence simulation for the predictions board.
//!
//! Two passes exist. The fallback pass animates synthetic telemetry when the
//! backend has nothing to say; the live pass adds a small jitter to every
//! prediction, real or synthetic, on each refresh. Both clamp and round to one
//! decimal, so stored confidences always match their wire form.

use rand::Rng;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::model::{Confidence, Prediction};

/// Event types shown when no real predictions exist.
pub const EVENT_CATALOG: [&str; 10] = [
    "Supernova",
    "Gamma-Ray Burst",
    "Fast Radio Burst",
    "Solar Flare",
    "Coronal Mass Ejection",
    "Gravitational Wave",
    "Black Hole Merger",
    "Neutron Star Merger",
    "Exoplanet Transit",
    "Asteroid Flyby",
];

const COLD_START_MIN: f64 = 10.0;
const COLD_START_SPAN: f64 = 30.0;

const FALLBACK_WALK: f64 = 2.0;
const FALLBACK_SPIKE_PROBABILITY: f64 = 0.05;
const FALLBACK_SPIKE: f64 = 15.0;
const FALLBACK_DECAY_THRESHOLD: f64 = 40.0;
const FALLBACK_DECAY: f64 = 1.5;
/// Bounds for fallback (cold-start) telemetry.
pub const FALLBACK_BOUNDS: (f64, f64) = (5.0, 99.9);

const LIVE_WALK: f64 = 0.3;
const LIVE_REANALYSIS_PROBABILITY: f64 = 0.01;
const LIVE_REANALYSIS: f64 = 1.0;
/// Bounds applied by the live jitter pass.
pub const LIVE_BOUNDS: (f64, f64) = (0.1, 99.9);

/// One synthetic prediction per catalog entry with low background confidence.
pub fn cold_start<R: Rng + ?Sized>(rng: &mut R, now: OffsetDateTime) -> Vec<Prediction> {
    let timestamp = scan_timestamp(now);
    EVENT_CATALOG
        .iter()
        .map(|event| {
            let raw = COLD_START_MIN + rng.random::<f64>() * COLD_START_SPAN;
            Prediction {
                event: (*event).to_string(),
                // floor keeps the value strictly under the span's upper edge
                confidence: Confidence::new((raw * 10.0).floor() / 10.0),
                timestamp: timestamp.clone(),
                coordinates: None,
                data_source: None,
                synthetic: true,
            }
        })
        .collect()
}

/// Random walk with rare detection spikes and decay toward baseline.
pub fn fallback_drift<R: Rng + ?Sized>(prediction: &mut Prediction, rng: &mut R, now: OffsetDateTime) {
    let mut value = start_value(prediction.confidence, FALLBACK_BOUNDS);
    value += rng.random_range(-FALLBACK_WALK..=FALLBACK_WALK);
    if rng.random_bool(FALLBACK_SPIKE_PROBABILITY) {
        value += FALLBACK_SPIKE;
    }
    if value > FALLBACK_DECAY_THRESHOLD {
        value -= FALLBACK_DECAY;
    }
    prediction.confidence = settle(value, FALLBACK_BOUNDS);
    prediction.timestamp = scan_timestamp(now);
}

/// Micro-jitter applied to every prediction on each refresh.
///
/// Real predictions keep their event timestamp.
pub fn live_drift<R: Rng + ?Sized>(prediction: &mut Prediction, rng: &mut R, now: OffsetDateTime) {
    let mut value = start_value(prediction.confidence, LIVE_BOUNDS);
    value += rng.random_range(-LIVE_WALK..=LIVE_WALK);
    if rng.random_bool(LIVE_REANALYSIS_PROBABILITY) {
        value += rng.random_range(-LIVE_REANALYSIS..=LIVE_REANALYSIS);
    }
    prediction.confidence = settle(value, LIVE_BOUNDS);
    if prediction.synthetic {
        prediction.timestamp = scan_timestamp(now);
    }
}

/// Whether the set needs a cold start before the fallback pass.
pub fn needs_cold_start(predictions: &[Prediction]) -> bool {
    predictions.first().is_none_or(Prediction::is_placeholder)
}

/// Fallback pass over the whole set, seeding the catalog first if needed.
pub fn simulate_fallback<R: Rng + ?Sized>(
    predictions: &mut Vec<Prediction>,
    rng: &mut R,
    now: OffsetDateTime,
) {
    if needs_cold_start(predictions) {
        *predictions = cold_start(rng, now);
    }
    for prediction in predictions.iter_mut() {
        fallback_drift(prediction, rng, now);
    }
}

/// Live pass over the whole set.
pub fn simulate_live<R: Rng + ?Sized>(predictions: &mut [Prediction], rng: &mut R, now: OffsetDateTime) {
    for prediction in predictions.iter_mut() {
        live_drift(prediction, rng, now);
    }
}

/// RFC 3339 timestamp used for simulated scans.
pub fn scan_timestamp(now: OffsetDateTime) -> String {
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn start_value(confidence: Confidence, (min, _): (f64, f64)) -> f64 {
    let value = confidence.value();
    if value.is_finite() { value } else { min }
}

fn settle(value: f64, (min, max): (f64, f64)) -> Confidence {
    let rounded = (value * 10.0).round() / 10.0;
    Confidence::new(if rounded.is_finite() { rounded.clamp(min, max) } else { min })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn real(event: &str, confidence: f64) -> Prediction {
        Prediction {
            event: event.to_string(),
            confidence: Confidence::new(confidence),
            timestamp: "2024-05-01T00:00:00Z".to_string(),
            coordinates: None,
            data_source: None,
            synthetic: false,
        }
    }

    #[test]
    fn cold_start_yields_ten_distinct_low_entries() {
        let mut rng = StdRng::seed_from_u64(7);
        let seeded = cold_start(&mut rng, now());
        assert_eq!(seeded.len(), 10);
        let names: HashSet<_> = seeded.iter().map(|p| p.event.as_str()).collect();
        assert_eq!(names.len(), 10);
        for prediction in &seeded {
            let value = prediction.confidence.value();
            assert!((10.0..40.0).contains(&value), "{value}");
            assert!(prediction.synthetic);
            assert_eq!(prediction.timestamp, "2023-11-14T22:13:20Z");
        }
    }

    #[test]
    fn fallback_drift_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut predictions = vec![real("low", 5.0), real("high", 99.9), real("mid", 45.0)];
        for _ in 0..5_000 {
            for prediction in predictions.iter_mut() {
                fallback_drift(prediction, &mut rng, now());
                let value = prediction.confidence.value();
                assert!((5.0..=99.9).contains(&value), "{value}");
            }
        }
    }

    #[test]
    fn live_drift_stays_within_bounds_and_is_finite() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut predictions = vec![
            real("floor", 0.1),
            real("ceiling", 99.9),
            real("broken", f64::NAN),
        ];
        for _ in 0..5_000 {
            simulate_live(&mut predictions, &mut rng, now());
            for prediction in &predictions {
                let value = prediction.confidence.value();
                assert!(value.is_finite());
                assert!((0.1..=99.9).contains(&value), "{value}");
            }
        }
    }

    #[test]
    fn live_drift_keeps_real_timestamps() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut prediction = real("Kilonova", 70.0);
        live_drift(&mut prediction, &mut rng, now());
        assert_eq!(prediction.timestamp, "2024-05-01T00:00:00Z");
        let delta = (prediction.confidence.value() - 70.0).abs();
        assert!(delta <= 1.4, "{delta}");
    }

    #[test]
    fn simulate_fallback_replaces_placeholder() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut predictions = vec![real(Prediction::PLACEHOLDER_EVENT, 0.0)];
        simulate_fallback(&mut predictions, &mut rng, now());
        assert_eq!(predictions.len(), 10);
        assert!(predictions.iter().all(|p| p.synthetic));
        for prediction in &predictions {
            assert!((5.0..=99.9).contains(&prediction.confidence.value()));
        }
    }

    #[test]
    fn simulate_fallback_drifts_existing_set_in_place() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut predictions = vec![real("Nova", 50.0)];
        simulate_fallback(&mut predictions, &mut rng, now());
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].event, "Nova");
        assert_eq!(predictions[0].timestamp, "2023-11-14T22:13:20Z");
    }
}

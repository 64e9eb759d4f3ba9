//! Data-stream terminals for the ZTF and TESS feeds.
//!
//! Each tick may append one packet per channel, gated independently by a
//! weighted coin. ZTF packets take their classification from the current
//! predictions when there are any. Each channel keeps at most `max_entries`
//! lines, dropping the oldest first.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::IndexedRandom;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::model::Prediction;
use crate::view::Tone;

/// Default number of retained lines per channel.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

const ZTF_PROBABILITY: f64 = 0.7;
const TESS_PROBABILITY: f64 = 0.4;
const MOCK_SUPERNOVA_PROBABILITY: f64 = 0.2;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ztf,
    Tess,
}

/// One telemetry packet as shown in a terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Ztf {
        id: String,
        ra: f64,
        dec: f64,
        mag: f64,
        classification: String,
    },
    Tess {
        id: String,
        sector: u8,
        camera: u8,
        flux: f64,
    },
    /// Feedback for user actions (generation requests, downloads).
    System {
        id: String,
        source: String,
        classification: String,
        status: String,
    },
}

impl Packet {
    pub fn id(&self) -> &str {
        match self {
            Self::Ztf { id, .. } | Self::Tess { id, .. } | Self::System { id, .. } => id,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Ztf { .. } => "ZTF",
            Self::Tess { .. } => "TESS",
            Self::System { source, .. } => source,
        }
    }

    pub fn classification(&self) -> Option<&str> {
        match self {
            Self::Ztf { classification, .. } | Self::System { classification, .. } => {
                Some(classification)
            }
            Self::Tess { .. } => None,
        }
    }

    /// Headline label: classification upper-cased, or `TELEMETRY`.
    pub fn label(&self) -> String {
        self.classification()
            .map(str::to_uppercase)
            .unwrap_or_else(|| "TELEMETRY".to_string())
    }

    pub fn is_alert(&self) -> bool {
        matches!(self.classification(), Some("Supernova" | "Gamma-Ray Burst"))
    }

    pub fn tone(&self) -> Tone {
        if self.classification() == Some("Supernova") {
            Tone::Critical
        } else if matches!(self, Self::Tess { .. }) {
            Tone::Purple
        } else {
            Tone::Blue
        }
    }

    /// Key/value body lines, like the pretty-printed packet in the terminal.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Ztf {
                id,
                ra,
                dec,
                mag,
                classification,
            } => vec![
                ("id", id.clone()),
                ("source", "ZTF".into()),
                ("ra", format!("{ra:.4}")),
                ("dec", format!("{dec:.4}")),
                ("mag", format!("{mag:.2}")),
                ("classification", classification.clone()),
            ],
            Self::Tess {
                id,
                sector,
                camera,
                flux,
            } => vec![
                ("id", id.clone()),
                ("source", "TESS".into()),
                ("sector", sector.to_string()),
                ("camera", camera.to_string()),
                ("flux", format!("{flux:.1}")),
                ("status", "TRANSIT_CHECK".into()),
            ],
            Self::System {
                id,
                source,
                classification,
                status,
            } => vec![
                ("id", id.clone()),
                ("source", source.clone()),
                ("classification", classification.clone()),
                ("status", status.clone()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// `HH:MM:SS` receive time.
    pub time: String,
    pub packet: Packet,
}

/// Latest-packet panel beside the ZTF terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetrics {
    pub latest_id: String,
    pub classification: String,
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub mag: String,
    /// Confidence bar fill in 0..=1.
    pub confidence: f64,
    pub confidence_tone: Tone,
    /// Packets per second, two decimals.
    pub ingest_rate: String,
    pub active_packets: u32,
}

/// Which channels received a packet on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ztf: bool,
    pub tess: bool,
}

#[derive(Debug, Clone)]
pub struct LogStream {
    ztf: VecDeque<LogEntry>,
    tess: VecDeque<LogEntry>,
    max_entries: usize,
    metrics: Option<StreamMetrics>,
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl LogStream {
    /// `max_entries` is raised to at least 1.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            ztf: VecDeque::with_capacity(max_entries),
            tess: VecDeque::with_capacity(max_entries),
            max_entries,
            metrics: None,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn entries(&self, channel: Channel) -> &VecDeque<LogEntry> {
        match channel {
            Channel::Ztf => &self.ztf,
            Channel::Tess => &self.tess,
        }
    }

    pub fn metrics(&self) -> Option<&StreamMetrics> {
        self.metrics.as_ref()
    }

    /// One stream tick.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        predictions: &[Prediction],
        now: OffsetDateTime,
    ) -> TickReport {
        let mut report = TickReport::default();
        if rng.random_bool(ZTF_PROBABILITY) {
            let packet = ztf_packet(rng, predictions);
            self.metrics = Some(stream_metrics(rng, &packet));
            self.append(Channel::Ztf, packet, now);
            report.ztf = true;
        }
        if rng.random_bool(TESS_PROBABILITY) {
            let packet = tess_packet(rng);
            self.append(Channel::Tess, packet, now);
            report.tess = true;
        }
        report
    }

    /// Append action feedback to a terminal under the same bound.
    pub fn push_system(&mut self, channel: Channel, packet: Packet, now: OffsetDateTime) {
        tracing::debug!(id = packet.id(), ?channel, "System packet logged");
        self.append(channel, packet, now);
    }

    fn append(&mut self, channel: Channel, packet: Packet, now: OffsetDateTime) {
        let max_entries = self.max_entries;
        let log = match channel {
            Channel::Ztf => &mut self.ztf,
            Channel::Tess => &mut self.tess,
        };
        while log.len() >= max_entries {
            log.pop_front();
        }
        log.push_back(LogEntry {
            time: receive_time(now),
            packet,
        });
    }
}

fn receive_time(now: OffsetDateTime) -> String {
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

fn ztf_packet<R: Rng + ?Sized>(rng: &mut R, predictions: &[Prediction]) -> Packet {
    let classification = match predictions.choose(rng) {
        Some(prediction) => prediction.event.replace(" [RARE]", ""),
        None if rng.random_bool(MOCK_SUPERNOVA_PROBABILITY) => "Supernova".to_string(),
        None => "Variable Star".to_string(),
    };
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    Packet::Ztf {
        id: format!("ZTF{}a{suffix}", rng.random_range(20..40)),
        ra: rng.random_range(0.0..360.0),
        dec: rng.random_range(-90.0..90.0),
        mag: rng.random_range(16.0..21.0),
        classification,
    }
}

fn tess_packet<R: Rng + ?Sized>(rng: &mut R) -> Packet {
    Packet::Tess {
        id: format!("TIC{}", rng.random_range(0..100_000_000u32)),
        sector: rng.random_range(1..=30),
        camera: rng.random_range(1..=4),
        flux: rng.random_range(0.0..1000.0),
    }
}

fn stream_metrics<R: Rng + ?Sized>(rng: &mut R, packet: &Packet) -> StreamMetrics {
    let (ra, dec, mag) = match packet {
        Packet::Ztf { ra, dec, mag, .. } => (
            Some(format!("{ra:.2}")),
            Some(format!("{dec:.2}")),
            format!("{mag:.2}"),
        ),
        _ => (None, None, "N/A".to_string()),
    };
    let confidence = rng.random_range(0.7..1.0);
    StreamMetrics {
        latest_id: packet.id().to_string(),
        classification: packet
            .classification()
            .map(str::to_uppercase)
            .unwrap_or_else(|| "UNKNOWN".into()),
        ra,
        dec,
        mag,
        confidence,
        confidence_tone: if confidence > 0.9 { Tone::Critical } else { Tone::Blue },
        ingest_rate: format!("{:.2}", rng.random_range(0.8..1.8)),
        active_packets: rng.random_range(800..900),
    }
}

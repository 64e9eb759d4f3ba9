//! Dashboard state store and the settle-all refresh.
//!
//! A refresh fetches every polled resource concurrently, waits for all of
//! them, then folds each outcome into its own slice. One failing resource
//! never blocks the others; the only hard stop is a 401 from the user stats
//! endpoint, which ends the session.

use rand::Rng;
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

use crate::api::{Endpoint, FetchResult, ResourceFetcher};
use crate::http_client::{HttpReply, TransportError};
use crate::model::{Datasets, NewsItem, PipelineStatus, Prediction, Star, StarsEnvelope, UserProfile};
use crate::pipeline::PipelineMachine;
use crate::session::SessionStore;
use crate::simulator;
use crate::solar::{SolarPanel, SolarPoint};
use crate::view::{Readout, SyntheticPanel, synthetic_panel};

/// Observer for slices that changed during a refresh.
///
/// Every method defaults to a no-op so listeners only implement what they
/// display.
pub trait StoreListener {
    fn predictions_updated(&mut self, _predictions: &[Prediction]) {}

    fn solar_updated(&mut self, _readout: &Readout, _series: &[SolarPoint]) {}

    fn user_updated(&mut self, _user: &UserProfile) {}

    fn news_updated(&mut self, _news: &[NewsItem]) {}

    fn logout_requested(&mut self) {}
}

impl StoreListener for () {}

/// What a refresh did with one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    Applied,
    /// Predictions came from the confidence simulator instead of the backend.
    Simulated,
    /// The slice kept its previous value.
    Stale(String),
    /// Not evaluated because the refresh stopped early.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub outcomes: Vec<(Endpoint, SliceOutcome)>,
    /// The backend rejected the session; the token has been cleared.
    pub logout: bool,
}

impl RefreshReport {
    pub fn outcome(&self, endpoint: Endpoint) -> Option<&SliceOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| *candidate == endpoint)
            .map(|(_, outcome)| outcome)
    }

    fn record(&mut self, endpoint: Endpoint, outcome: SliceOutcome) {
        if let SliceOutcome::Stale(reason) = &outcome {
            tracing::warn!(path = endpoint.path(), "Keeping stale slice: {reason}");
        }
        self.outcomes.push((endpoint, outcome));
    }
}

/// Latest snapshot of everything the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub stars: Vec<Star>,
    pub predictions: Vec<Prediction>,
    pub datasets: Datasets,
    pub pipeline: PipelineMachine,
    pub user: UserProfile,
    pub news: Vec<NewsItem>,
    pub solar: SolarPanel,
    pub synthetic: Option<SyntheticPanel>,
}

impl DashboardState {
    /// Synthetic-injection panel, computed on demand before the first refresh.
    pub fn synthetic_panel(&self) -> SyntheticPanel {
        self.synthetic
            .clone()
            .unwrap_or_else(|| synthetic_panel(&self.predictions))
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    state: DashboardState,
    offset: UtcOffset,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Store {
    /// `offset` is used for chart labels.
    pub fn new(offset: UtcOffset) -> Self {
        Self {
            state: DashboardState::default(),
            offset,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    /// Fetch every polled resource and merge the results.
    pub fn refresh<F, L, R>(
        &mut self,
        fetcher: &F,
        session: &SessionStore,
        listener: &mut L,
        rng: &mut R,
        now: OffsetDateTime,
    ) -> RefreshReport
    where
        F: ResourceFetcher,
        L: StoreListener + ?Sized,
        R: Rng + ?Sized,
    {
        let [stars, predictions, datasets, pipeline, user, solar, news] = fetch_all(fetcher);
        let mut report = RefreshReport::default();

        report.record(Endpoint::Datasets, self.apply_datasets(&datasets));
        report.record(Endpoint::Stars, self.apply_stars(&stars));

        let outcome = self.apply_predictions(&predictions, rng, now);
        report.record(Endpoint::Predictions, outcome);
        listener.predictions_updated(&self.state.predictions);

        let outcome = if self.state.solar.apply(&solar, self.offset) {
            listener.solar_updated(self.state.solar.readout(), self.state.solar.series());
            SliceOutcome::Applied
        } else {
            SliceOutcome::Stale(self.state.solar.readout().text.clone())
        };
        report.record(Endpoint::SolarFlux, outcome);

        self.state.synthetic = Some(synthetic_panel(&self.state.predictions));

        report.record(Endpoint::Pipeline, self.apply_pipeline(&pipeline));

        match &user {
            Ok(reply) if reply.status == 401 => {
                tracing::warn!("Session expired; logging out");
                if let Err(err) = session.clear() {
                    tracing::warn!("Failed to clear session token: {err}");
                }
                report.record(Endpoint::UserStats, SliceOutcome::Stale("HTTP 401".into()));
                report.record(Endpoint::News, SliceOutcome::Skipped);
                report.logout = true;
                listener.logout_requested();
                return report;
            }
            _ => {
                let outcome = match decode::<UserProfile>(&user) {
                    Ok(profile) => {
                        self.state.user = profile;
                        listener.user_updated(&self.state.user);
                        SliceOutcome::Applied
                    }
                    Err(reason) => SliceOutcome::Stale(reason),
                };
                report.record(Endpoint::UserStats, outcome);
            }
        }

        let outcome = match decode::<Vec<NewsItem>>(&news) {
            Ok(items) => {
                self.state.news = items;
                listener.news_updated(&self.state.news);
                SliceOutcome::Applied
            }
            Err(reason) => SliceOutcome::Stale(reason),
        };
        report.record(Endpoint::News, outcome);

        tracing::debug!(
            predictions = self.state.predictions.len(),
            news = self.state.news.len(),
            "State updated"
        );
        report
    }

    fn apply_datasets(&mut self, result: &FetchResult) -> SliceOutcome {
        match decode::<Datasets>(result) {
            Ok(datasets) => {
                self.state.datasets = datasets;
                SliceOutcome::Applied
            }
            Err(reason) => SliceOutcome::Stale(reason),
        }
    }

    fn apply_stars(&mut self, result: &FetchResult) -> SliceOutcome {
        match decode::<StarsEnvelope>(result) {
            Ok(envelope) => {
                self.state.stars = envelope.stars;
                SliceOutcome::Applied
            }
            Err(reason) => SliceOutcome::Stale(reason),
        }
    }

    fn apply_pipeline(&mut self, result: &FetchResult) -> SliceOutcome {
        match decode::<PipelineStatus>(result) {
            Ok(status) => {
                self.state.pipeline.apply(status);
                SliceOutcome::Applied
            }
            Err(reason) => SliceOutcome::Stale(reason),
        }
    }

    fn apply_predictions<R: Rng + ?Sized>(
        &mut self,
        result: &FetchResult,
        rng: &mut R,
        now: OffsetDateTime,
    ) -> SliceOutcome {
        let predictions = &mut self.state.predictions;
        let loaded = match decode::<Value>(result) {
            Ok(Value::Array(items)) if !items.is_empty() => {
                match serde_json::from_value::<Vec<Prediction>>(Value::Array(items)) {
                    Ok(real) => {
                        *predictions = real;
                        true
                    }
                    Err(err) => {
                        tracing::warn!("Predictions payload rejected: {err}");
                        false
                    }
                }
            }
            Ok(object @ Value::Object(_)) if has_event(&object) => {
                match serde_json::from_value::<Prediction>(object) {
                    Ok(single) => {
                        predictions.insert(0, single);
                        true
                    }
                    Err(err) => {
                        tracing::warn!("Legacy prediction rejected: {err}");
                        false
                    }
                }
            }
            Ok(_) => false,
            Err(reason) => {
                tracing::warn!("Predictions unavailable: {reason}");
                false
            }
        };
        if !loaded {
            simulator::simulate_fallback(predictions, rng, now);
        }
        simulator::simulate_live(predictions, rng, now);
        if loaded {
            SliceOutcome::Applied
        } else {
            SliceOutcome::Simulated
        }
    }
}

fn has_event(object: &Value) -> bool {
    object
        .get("event")
        .and_then(Value::as_str)
        .is_some_and(|event| !event.is_empty())
}

/// Issue every polled GET on its own scoped thread and wait for all of them.
fn fetch_all<F: ResourceFetcher>(fetcher: &F) -> [FetchResult; 7] {
    std::thread::scope(|scope| {
        let handles = Endpoint::POLLED.map(|endpoint| scope.spawn(move || fetcher.get(endpoint)));
        handles.map(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err(TransportError::Transport("fetch worker panicked".into())))
        })
    })
}

/// Body of a successful reply, or the reason the slice stays stale.
fn decode<T: serde::de::DeserializeOwned>(result: &FetchResult) -> Result<T, String> {
    let reply: &HttpReply = match result {
        Ok(reply) => reply,
        Err(err) => return Err(err.to_string()),
    };
    if !reply.is_ok() {
        return Err(format!("HTTP {}", reply.status));
    }
    reply.json().map_err(|err| format!("Invalid JSON: {err}"))
}

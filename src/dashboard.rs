//! The dashboard context: state, widgets, and the tasks that drive them.
//!
//! Everything the dashboard does is a task on the virtual-time scheduler.
//! Tests advance the clock directly; the binary sleeps between due times.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use time::{OffsetDateTime, UtcOffset};

use crate::actions::{self, ActionContext, ActionError, ChatReply, Download};
use crate::api::{Endpoint, ResourceFetcher};
use crate::carousel::{Carousel, LoadOutcome};
use crate::config::{AppConfig, TimerSettings};
use crate::log_stream::LogStream;
use crate::scheduler::{CancellationToken, Scheduler};
use crate::session::SessionStore;
use crate::store::{RefreshReport, Store, StoreListener};
use crate::view::{Readout, SyntheticPanel, Tone};

/// Work items on the dashboard scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// First state refresh right after start.
    InitialRefresh,
    Poll,
    LogTick,
    PipelineTick,
    EarthFetch,
    CarouselRotate,
    CarouselSwap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardStatus {
    Idle,
    Running,
    /// Forced logout; no further tasks fire.
    Stopped,
}

/// Construction options, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub timers: TimerSettings,
    pub max_log_entries: usize,
    pub download_dir: PathBuf,
    /// Offset used for displayed times.
    pub offset: UtcOffset,
}

impl DashboardOptions {
    pub fn from_config(config: &AppConfig, download_dir: PathBuf, offset: UtcOffset) -> Self {
        Self {
            timers: config.timers.normalized(),
            max_log_entries: config.log_stream.max_entries,
            download_dir,
            offset,
        }
    }
}

pub struct Dashboard<F: ResourceFetcher, L: StoreListener> {
    fetcher: F,
    session: Arc<SessionStore>,
    listener: L,
    store: Store,
    carousel: Carousel,
    log_stream: LogStream,
    scheduler: Scheduler<Task>,
    tokens: Vec<CancellationToken>,
    /// Pending fade-in; each rotation replaces it.
    swap_token: Option<CancellationToken>,
    rng: StdRng,
    options: DashboardOptions,
    started_at: OffsetDateTime,
    status: DashboardStatus,
    last_report: Option<RefreshReport>,
}

impl<F: ResourceFetcher, L: StoreListener> Dashboard<F, L> {
    /// `started_at` anchors the virtual clock to calendar time.
    pub fn new(
        fetcher: F,
        session: Arc<SessionStore>,
        listener: L,
        options: DashboardOptions,
        rng: StdRng,
        started_at: OffsetDateTime,
    ) -> Self {
        Self {
            fetcher,
            session,
            listener,
            store: Store::new(options.offset),
            carousel: Carousel::new(),
            log_stream: LogStream::new(options.max_log_entries),
            scheduler: Scheduler::new(),
            tokens: Vec::new(),
            swap_token: None,
            rng,
            options,
            started_at,
            status: DashboardStatus::Idle,
            last_report: None,
        }
    }

    pub fn status(&self) -> DashboardStatus {
        self.status
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    pub fn log_stream(&self) -> &LogStream {
        &self.log_stream
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn last_report(&self) -> Option<&RefreshReport> {
        self.last_report.as_ref()
    }

    /// Elapsed virtual time.
    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }

    /// Calendar time at the current virtual instant, in the display offset.
    pub fn now(&self) -> OffsetDateTime {
        (self.started_at + self.scheduler.now()).to_offset(self.options.offset)
    }

    /// Due time of the next task, if any is pending.
    pub fn next_due(&mut self) -> Option<Duration> {
        if self.status == DashboardStatus::Stopped {
            return None;
        }
        self.scheduler.next_due()
    }

    /// Register the default tasks. Calling it twice has no effect.
    pub fn start(&mut self) {
        if self.status != DashboardStatus::Idle {
            return;
        }
        let timers = self.options.timers;
        let tokens = [
            self.scheduler.after(Task::InitialRefresh, Duration::ZERO),
            self.scheduler.every(Task::Poll, timers.poll()),
            self.scheduler.every(Task::LogTick, timers.log_tick()),
            self.scheduler.every(Task::PipelineTick, timers.pipeline_tick()),
            self.scheduler.after(Task::EarthFetch, timers.earth_initial_delay()),
        ];
        self.tokens.extend(tokens);
        self.status = DashboardStatus::Running;
        tracing::info!(poll_ms = timers.poll_ms, "Dashboard started");
    }

    /// Fire every task due up to `deadline` in order, then move the clock there.
    pub fn run_until(&mut self, deadline: Duration) -> DashboardStatus {
        while self.status == DashboardStatus::Running {
            match self.scheduler.next_due() {
                Some(due) if due <= deadline => {
                    self.scheduler.advance_to(due);
                    while let Some(task) = self.scheduler.pop_due() {
                        self.fire(task);
                        if self.status != DashboardStatus::Running {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        if self.status != DashboardStatus::Stopped {
            self.scheduler.advance_to(deadline);
        }
        self.status
    }

    /// Refresh immediately, outside the poll schedule.
    pub fn refresh_now(&mut self) -> RefreshReport {
        let now = self.now();
        let report = self.store.refresh(
            &self.fetcher,
            &self.session,
            &mut self.listener,
            &mut self.rng,
            now,
        );
        if report.logout {
            self.stop();
        }
        self.last_report = Some(report.clone());
        report
    }

    /// Fetch the Earth imagery list and start rotating on first success.
    pub fn reload_earth(&mut self) -> LoadOutcome {
        let result = self.fetcher.get(Endpoint::EarthLive);
        let outcome = self.carousel.load(&result);
        if outcome == LoadOutcome::StartRotation && self.status == DashboardStatus::Running {
            self.carousel.begin_rotation();
            let token = self
                .scheduler
                .every(Task::CarouselRotate, self.options.timers.carousel_rotate());
            self.tokens.push(token);
        }
        outcome
    }

    /// Upload a synthetic stream file, then refresh so it shows up at once.
    pub fn upload(&mut self, path: &std::path::Path) -> Result<RefreshReport, ActionError> {
        self.set_synthetic_status(Readout::new("STREAMING...", Tone::Warning));
        match actions::upload_synthetic(&self.fetcher, path) {
            Ok(receipt) => {
                tracing::info!(%receipt, "Injection success");
                self.set_synthetic_status(Readout::new("ACTIVE", Tone::Nominal));
                Ok(self.refresh_now())
            }
            Err(err) => {
                tracing::error!("Injection failed: {err}");
                self.set_synthetic_status(Readout::new("ERROR", Tone::Critical));
                Err(err)
            }
        }
    }

    pub fn generate(&mut self, event_type: &str) -> Result<Download, ActionError> {
        let now = self.now();
        actions::generate_synthetic(
            &self.fetcher,
            event_type,
            ActionContext {
                stream: &mut self.log_stream,
                rng: &mut self.rng,
                download_dir: &self.options.download_dir,
                now,
            },
        )
    }

    pub fn generate_ai(&mut self, prompt: &str) -> Result<Download, ActionError> {
        let now = self.now();
        actions::generate_synthetic_ai(
            &self.fetcher,
            prompt,
            ActionContext {
                stream: &mut self.log_stream,
                rng: &mut self.rng,
                download_dir: &self.options.download_dir,
                now,
            },
        )
    }

    pub fn chat(&self, message: &str) -> Result<ChatReply, ActionError> {
        actions::chat(&self.fetcher, message)
    }

    fn fire(&mut self, task: Task) {
        tracing::trace!(?task, elapsed_ms = self.elapsed().as_millis() as u64, "Task fired");
        match task {
            Task::InitialRefresh | Task::Poll => {
                self.refresh_now();
            }
            Task::LogTick => {
                let now = self.now();
                let predictions = &self.store.state().predictions;
                self.log_stream.tick(&mut self.rng, predictions, now);
            }
            Task::PipelineTick => {
                self.store.state_mut().pipeline.tick(&mut self.rng);
            }
            Task::EarthFetch => {
                self.reload_earth();
            }
            Task::CarouselRotate => {
                if self.carousel.rotate().is_some() {
                    let token = self
                        .scheduler
                        .after(Task::CarouselSwap, self.options.timers.carousel_swap());
                    self.swap_token = Some(token);
                }
            }
            Task::CarouselSwap => {
                self.carousel.complete_swap();
            }
        }
    }

    fn set_synthetic_status(&mut self, last_event: Readout) {
        let state = self.store.state_mut();
        let status = state.synthetic_panel().status;
        state.synthetic = Some(SyntheticPanel { last_event, status });
    }

    /// Cancel every scheduled task after a forced logout.
    fn stop(&mut self) {
        for token in self.tokens.drain(..).chain(self.swap_token.take()) {
            token.cancel();
        }
        self.status = DashboardStatus::Stopped;
        tracing::warn!("Dashboard stopped: session expired");
    }
}

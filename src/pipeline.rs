//! Self-driving MLOps pipeline animation.
//!
//! The backend reports a pipeline snapshot on each poll; between polls the
//! machine advances the running step, hands off to the next one on
//! completion and loops the whole cycle once every step is done.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::model::{PipelineStatus, PipelineStep, StepStatus};
use crate::view::Tone;

/// Steps shown when the backend has not reported any.
pub const SKELETON_STEPS: [&str; 5] = [
    "Data Ingestion",
    "Preprocessing",
    "Model Training",
    "Evaluation",
    "Deployment",
];

pub const TRAINING_STEP: &str = "Model Training";

/// Points kept per metric chart.
pub const CHART_POINTS: usize = 20;

const RESTART_PROBABILITY: f64 = 0.05;
const PROGRESS_MIN: f64 = 2.0;
const PROGRESS_SPAN: f64 = 5.0;
const LOAD_WALK: f64 = 2.5;
const LOAD_DEFAULT: f64 = 40.0;
const ACCURACY_WALK: f64 = 0.005;
const ACCURACY_DEFAULT: f64 = 0.85;
const ACCURACY_BOUNDS: (f64, f64) = (0.70, 0.99);
const INFERENCE_PROBABILITY: f64 = 0.3;
const INFERENCE_EVENTS: [&str; 7] = [
    "Supernova",
    "Gamma-Ray Burst",
    "Solar Flare",
    "Kilonova",
    "Exoplanet Transit",
    "Black Hole Merger",
    "Unknown Anomaly",
];

/// Result shown by the few-shot inference panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub event: &'static str,
    /// Percent, one decimal, in [80, 100).
    pub confidence: f64,
    /// Glow colour: nominal above 90 %, cyan otherwise.
    pub tone: Tone,
}

impl Inference {
    pub fn label(&self) -> String {
        format!("{}: {:.1}%", self.event, self.confidence)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMachine {
    status: PipelineStatus,
    accuracy_history: VecDeque<f64>,
    load_history: VecDeque<f64>,
    inference: Option<Inference>,
}

impl PipelineMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    /// Replace the snapshot with a fresh backend report.
    ///
    /// Step progress is clamped to [0, 100]; non-finite values become 0.
    pub fn apply(&mut self, mut status: PipelineStatus) {
        for step in &mut status.steps {
            step.progress = if step.progress.is_finite() {
                step.progress.clamp(0.0, 100.0)
            } else {
                0.0
            };
        }
        self.status = status;
    }

    /// Training accuracy chart (percent), oldest first.
    pub fn accuracy_history(&self) -> &VecDeque<f64> {
        &self.accuracy_history
    }

    /// System load chart, oldest first.
    pub fn load_history(&self) -> &VecDeque<f64> {
        &self.load_history
    }

    pub fn inference(&self) -> Option<&Inference> {
        self.inference.as_ref()
    }

    pub fn running_index(&self) -> Option<usize> {
        self.status
            .steps
            .iter()
            .position(|step| step.status == StepStatus::Running)
    }

    /// One animation tick.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.fluctuate_metrics(rng);
        if rng.random_bool(INFERENCE_PROBABILITY) {
            self.inference = Some(infer(rng));
        }
        if self.status.steps.is_empty() {
            self.status.steps = SKELETON_STEPS
                .iter()
                .map(|name| PipelineStep::pending(*name))
                .collect();
        }
        self.normalize_running();
        if self.running_index().is_none() {
            self.start_next(rng);
        }
        if let Some(index) = self.running_index() {
            self.advance(index, rng);
        }
    }

    fn fluctuate_metrics<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let metrics = &mut self.status.metrics;
        let load = or_default(metrics.system_load, LOAD_DEFAULT);
        metrics.system_load = (load + rng.random_range(-LOAD_WALK..LOAD_WALK)).clamp(0.0, 100.0);
        let accuracy = or_default(metrics.training_accuracy, ACCURACY_DEFAULT);
        let (min, max) = ACCURACY_BOUNDS;
        metrics.training_accuracy =
            (accuracy + rng.random_range(-ACCURACY_WALK..ACCURACY_WALK)).clamp(min, max);

        push_point(&mut self.accuracy_history, metrics.training_accuracy * 100.0);
        push_point(&mut self.load_history, metrics.system_load);
    }

    /// Keep only the first running step running.
    fn normalize_running(&mut self) {
        let mut seen = false;
        for step in &mut self.status.steps {
            if step.status != StepStatus::Running {
                continue;
            }
            if seen {
                tracing::debug!(step = %step.name, "Demoting extra running step");
                step.status = StepStatus::Pending;
            }
            seen = true;
        }
    }

    fn start_next<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let steps = &mut self.status.steps;
        if steps.iter().all(|step| step.status == StepStatus::Completed) {
            if rng.random_bool(RESTART_PROBABILITY) {
                tracing::info!("Pipeline cycle restarting");
                for step in steps.iter_mut() {
                    step.status = StepStatus::Pending;
                    step.progress = 0.0;
                }
                steps[0].status = StepStatus::Running;
            }
            return;
        }
        if let Some(step) = steps
            .iter_mut()
            .find(|step| matches!(step.status, StepStatus::Pending | StepStatus::Ready))
        {
            step.status = StepStatus::Running;
        }
    }

    fn advance<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        let steps = &mut self.status.steps;
        let step = &mut steps[index];
        let progress = if step.progress.is_finite() { step.progress.max(0.0) } else { 0.0 };
        step.progress = progress + PROGRESS_MIN + rng.random::<f64>() * PROGRESS_SPAN;
        let completed = step.progress >= 100.0;
        if completed {
            step.status = StepStatus::Completed;
            step.progress = 100.0;
        }
        if step.name == TRAINING_STEP {
            let epoch = (step.progress / 10.0).floor() as u32 + 1;
            step.epoch = Some(epoch);
            step.loss = Some((0.5 / f64::from(epoch) * 10_000.0).round() / 10_000.0);
        }
        if completed {
            tracing::debug!(step = %step.name, "Pipeline step completed");
            if let Some(next) = steps.get_mut(index + 1) {
                next.status = StepStatus::Running;
            }
        }
    }
}

/// `(status label, detail line)` for a pipeline node.
pub fn node_caption(step: &PipelineStep) -> (&'static str, Option<String>) {
    match step.status {
        StepStatus::Running => {
            let detail = if step.name == TRAINING_STEP {
                match step.loss {
                    Some(loss) => format!("Loss: {loss:.4}"),
                    None => "Loss: ?".to_string(),
                }
            } else {
                "Processing...".to_string()
            };
            ("(Running)", Some(detail))
        }
        StepStatus::Completed => ("(Done)", None),
        StepStatus::Ready => ("(Ready)", None),
        StepStatus::Pending => ("(Waiting)", None),
    }
}

fn or_default(value: f64, default: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        default
    } else {
        value
    }
}

fn push_point(history: &mut VecDeque<f64>, value: f64) {
    if history.len() >= CHART_POINTS {
        history.pop_front();
    }
    history.push_back(value);
}

fn infer<R: Rng + ?Sized>(rng: &mut R) -> Inference {
    let event = INFERENCE_EVENTS.choose(rng).copied().unwrap_or("Unknown Anomaly");
    let confidence = ((80.0 + rng.random::<f64>() * 20.0) * 10.0).round() / 10.0;
    Inference {
        event,
        confidence,
        tone: if confidence > 90.0 { Tone::Nominal } else { Tone::Cyan },
    }
}

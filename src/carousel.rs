//! Live Earth carousel.
//!
//! The widget cycles satellite frames on a fixed interval. A rotation fades
//! the current frame out, and the next frame is swapped in once the swap
//! delay has passed. The carousel only tracks state; the dashboard schedules
//! the rotation and swap timers.

use crate::api::FetchResult;
use crate::model::EarthSource;

/// Indicator shown when the feed could not be reached.
pub const OFFLINE_TEXT: &str = "Feed Offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselState {
    /// Nothing loaded yet (or the backend returned no frames).
    Idle,
    /// First frame shown, rotation not started.
    Loaded,
    Rotating,
    /// Fetch failed. Terminal until the next explicit load.
    Offline,
}

/// What the image element currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub url: String,
    /// `LIVE • <satellite>`.
    pub caption: String,
    pub region: String,
}

impl Frame {
    fn from_source(source: &EarthSource) -> Self {
        let satellite = source.title.split('(').next().unwrap_or_default().trim();
        Self {
            url: source.url.clone(),
            caption: format!("LIVE • {satellite}"),
            region: source.region.clone(),
        }
    }
}

/// Effect of feeding a fetch result to [`Carousel::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Frames were loaded and the rotation timer must be started.
    StartRotation,
    /// Frames were refreshed; rotation already running.
    Refreshed,
    /// Nothing to show.
    Empty,
    Offline,
}

#[derive(Debug, Clone)]
pub struct Carousel {
    sources: Vec<EarthSource>,
    current: usize,
    state: CarouselState,
    frame: Option<Frame>,
    /// Fade-out in progress; the index to swap in.
    pending_swap: Option<usize>,
    rotation_started: bool,
}

impl Default for Carousel {
    fn default() -> Self {
        Self::new()
    }
}

impl Carousel {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            current: 0,
            state: CarouselState::Idle,
            frame: None,
            pending_swap: None,
            rotation_started: false,
        }
    }

    pub fn state(&self) -> CarouselState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Frame currently displayed, if any.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// True between a rotation and its swap (image faded out).
    pub fn is_fading(&self) -> bool {
        self.pending_swap.is_some()
    }

    /// Apply the result of `GET /api/earth/live`.
    ///
    /// A reply that is not OK keeps the current frames. A transport failure or
    /// unreadable body switches to the offline indicator.
    pub fn load(&mut self, result: &FetchResult) -> LoadOutcome {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!("Earth feed error: {err}");
                return self.go_offline();
            }
        };
        if !reply.is_ok() {
            tracing::warn!(status = reply.status, "Earth feed returned non-OK status");
            return LoadOutcome::Empty;
        }
        let sources: Vec<EarthSource> = match reply.json() {
            Ok(sources) => sources,
            Err(err) => {
                tracing::error!("Earth feed error: {err}");
                return self.go_offline();
            }
        };
        self.sources = sources;
        if self.sources.is_empty() {
            return LoadOutcome::Empty;
        }
        if self.current >= self.sources.len() {
            self.current = 0;
        }
        self.pending_swap = None;
        self.frame = Some(Frame::from_source(&self.sources[self.current]));
        if self.rotation_started {
            self.state = CarouselState::Rotating;
            return LoadOutcome::Refreshed;
        }
        self.state = CarouselState::Loaded;
        LoadOutcome::StartRotation
    }

    /// Mark the rotation timer as running.
    pub fn begin_rotation(&mut self) {
        if self.state == CarouselState::Loaded {
            self.state = CarouselState::Rotating;
            self.rotation_started = true;
        }
    }

    /// Advance to the next frame and start the fade-out.
    ///
    /// Returns the new index, or `None` when not rotating.
    pub fn rotate(&mut self) -> Option<usize> {
        if self.state != CarouselState::Rotating || self.sources.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.sources.len();
        self.pending_swap = Some(self.current);
        Some(self.current)
    }

    /// Swap in the frame chosen by the last rotation (fade-in).
    pub fn complete_swap(&mut self) -> Option<&Frame> {
        let index = self.pending_swap.take()?;
        let source = self.sources.get(index)?;
        self.frame = Some(Frame::from_source(source));
        tracing::debug!(index, region = %source.region, "Earth frame swapped");
        self.frame.as_ref()
    }

    /// Offline indicator text, when offline.
    pub fn indicator(&self) -> Option<&'static str> {
        (self.state == CarouselState::Offline).then_some(OFFLINE_TEXT)
    }

    fn go_offline(&mut self) -> LoadOutcome {
        self.state = CarouselState::Offline;
        self.pending_swap = None;
        LoadOutcome::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpReply, TransportError};

    fn sources(count: usize) -> FetchResult {
        let list: Vec<_> = (0..count)
            .map(|idx| {
                serde_json::json!({
                    "id": format!("sat-{idx}"),
                    "title": format!("GOES-{idx} (Americas/Atlantic)"),
                    "url": format!("https://img.invalid/{idx}.jpg"),
                    "region": format!("Region {idx}"),
                })
            })
            .collect();
        Ok(HttpReply::ok(serde_json::to_vec(&list).unwrap()))
    }

    #[test]
    fn first_load_shows_index_zero_and_requests_rotation() {
        let mut carousel = Carousel::new();
        assert_eq!(carousel.load(&sources(2)), LoadOutcome::StartRotation);
        assert_eq!(carousel.state(), CarouselState::Loaded);
        let frame = carousel.frame().unwrap();
        assert_eq!(frame.caption, "LIVE • GOES-0");
        assert_eq!(frame.region, "Region 0");
    }

    #[test]
    fn rotation_wraps_and_never_leaves_bounds() {
        let mut carousel = Carousel::new();
        carousel.load(&sources(3));
        carousel.begin_rotation();
        let mut seen = Vec::new();
        for _ in 0..7 {
            let index = carousel.rotate().unwrap();
            assert!(index < carousel.len());
            assert!(carousel.is_fading());
            carousel.complete_swap().unwrap();
            seen.push(index);
        }
        assert_eq!(seen, [1, 2, 0, 1, 2, 0, 1]);
        assert_eq!(carousel.frame().unwrap().url, "https://img.invalid/1.jpg");
    }

    #[test]
    fn single_frame_rotates_onto_itself() {
        let mut carousel = Carousel::new();
        carousel.load(&sources(1));
        carousel.begin_rotation();
        assert_eq!(carousel.rotate(), Some(0));
    }

    #[test]
    fn reload_does_not_restart_rotation() {
        let mut carousel = Carousel::new();
        carousel.load(&sources(2));
        carousel.begin_rotation();
        carousel.rotate();
        assert_eq!(carousel.load(&sources(2)), LoadOutcome::Refreshed);
        assert_eq!(carousel.state(), CarouselState::Rotating);
        assert!(!carousel.is_fading());
    }

    #[test]
    fn reload_with_fewer_frames_resets_index() {
        let mut carousel = Carousel::new();
        carousel.load(&sources(3));
        carousel.begin_rotation();
        carousel.rotate();
        carousel.rotate();
        carousel.load(&sources(1));
        assert_eq!(carousel.current_index(), 0);
    }

    #[test]
    fn empty_list_stays_idle() {
        let mut carousel = Carousel::new();
        assert_eq!(carousel.load(&sources(0)), LoadOutcome::Empty);
        assert_eq!(carousel.state(), CarouselState::Idle);
        assert_eq!(carousel.rotate(), None);
    }

    #[test]
    fn transport_failure_goes_offline() {
        let mut carousel = Carousel::new();
        let result = Err(TransportError::Transport("connection refused".into()));
        assert_eq!(carousel.load(&result), LoadOutcome::Offline);
        assert_eq!(carousel.indicator(), Some(OFFLINE_TEXT));
        assert_eq!(carousel.rotate(), None);
    }

    #[test]
    fn non_ok_status_is_not_offline() {
        let mut carousel = Carousel::new();
        let result = Ok(HttpReply::with_status(503, "busy"));
        assert_eq!(carousel.load(&result), LoadOutcome::Empty);
        assert_eq!(carousel.indicator(), None);
    }
}

//! Deciding when scrolling should load the next chapter.
//!
//! [`ScrollPolicy`] is a two-state machine, `Ready -> Throttled -> Ready`.
//! A qualifying scroll event fires a trigger and starts a fixed cool-down;
//! events during the cool-down are ignored. The cool-down is time based, so
//! a slow load does not hold back the next trigger. Overlapping loads are
//! prevented by the controller, not here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::controller::{AdvanceOutcome, Controller};
use crate::fetch::ChapterSource;
use crate::surface::ReaderSurface;

pub const DEFAULT_THRESHOLD_PX: f64 = 800.0;
pub const DEFAULT_VISIBLE_PERCENT: f64 = 90.0;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Geometry of the last appended chapter element, relative to the top of
/// the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementRect {
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
    pub last_element: Option<ElementRect>,
}

impl Viewport {
    /// A viewport scrolled all the way down, with the last chapter fully read.
    pub fn at_bottom() -> Self {
        Self {
            scroll_top: 0.0,
            scroll_height: 0.0,
            client_height: 0.0,
            last_element: Some(ElementRect {
                top: 0.0,
                height: 0.0,
            }),
        }
    }

    pub fn distance_to_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    /// How much of the last chapter element has scrolled into or past the
    /// viewport, in percent.
    pub fn last_element_read_percent(&self) -> Option<f64> {
        let rect = self.last_element?;
        if rect.height <= 0.0 {
            return Some(100.0);
        }
        let read = (self.client_height - rect.top) / rect.height * 100.0;
        Some(read.clamp(0.0, 100.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Fire when fewer than `threshold_px` pixels remain below the viewport.
    DistanceToBottom { threshold_px: f64 },
    /// Fire when at least `percent` of the last chapter has been scrolled.
    LastElementVisible { percent: f64 },
}

impl Default for Trigger {
    fn default() -> Self {
        Self::DistanceToBottom {
            threshold_px: DEFAULT_THRESHOLD_PX,
        }
    }
}

impl Trigger {
    pub fn is_met(&self, viewport: &Viewport) -> bool {
        match *self {
            Self::DistanceToBottom { threshold_px } => viewport.distance_to_bottom() < threshold_px,
            Self::LastElementVisible { percent } => viewport
                .last_element_read_percent()
                .is_some_and(|read| read >= percent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    Ready,
    Throttled { until: Instant },
}

#[derive(Debug, Clone)]
pub struct ScrollPolicy {
    trigger: Trigger,
    cooldown: Duration,
    state: ThrottleState,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self::new(Trigger::default(), DEFAULT_COOLDOWN)
    }
}

impl ScrollPolicy {
    pub fn new(trigger: Trigger, cooldown: Duration) -> Self {
        Self {
            trigger,
            cooldown,
            state: ThrottleState::Ready,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Current throttle state, re-armed if the cool-down has elapsed.
    pub fn state(&mut self, now: Instant) -> ThrottleState {
        if let ThrottleState::Throttled { until } = self.state {
            if now >= until {
                self.state = ThrottleState::Ready;
            }
        }
        self.state
    }

    /// Returns whether this scroll event should trigger an advance.
    pub fn on_scroll(&mut self, viewport: &Viewport, now: Instant) -> bool {
        if self.state(now) != ThrottleState::Ready {
            return false;
        }
        if !self.trigger.is_met(viewport) {
            return false;
        }
        self.state = ThrottleState::Throttled {
            until: now + self.cooldown,
        };
        true
    }
}

/// Feeds viewport events through `policy` and spawns an advance for every
/// trigger. Returns the outcomes of all spawned advances once `events`
/// closes.
pub async fn drive<S, D>(
    controller: Arc<Controller<S, D>>,
    mut policy: ScrollPolicy,
    mut events: mpsc::Receiver<Viewport>,
) -> Vec<AdvanceOutcome>
where
    S: ChapterSource + 'static,
    D: ReaderSurface + 'static,
{
    let mut in_flight = JoinSet::new();
    let mut outcomes = Vec::new();

    while let Some(viewport) = events.recv().await {
        while let Some(done) = in_flight.try_join_next() {
            collect(done, &mut outcomes);
        }
        if !policy.on_scroll(&viewport, Instant::now()) {
            continue;
        }
        let controller = Arc::clone(&controller);
        in_flight.spawn(async move { controller.advance().await });
    }

    while let Some(done) = in_flight.join_next().await {
        collect(done, &mut outcomes);
    }
    outcomes
}

fn collect(
    done: Result<AdvanceOutcome, tokio::task::JoinError>,
    outcomes: &mut Vec<AdvanceOutcome>,
) {
    match done {
        Ok(outcome) => outcomes.push(outcome),
        Err(err) => tracing::error!(?err, "advance task failed"),
    }
}

#![forbid(unsafe_code)]

//! Smooth programmatic scrolling between sections.
//!
//! The navigator owns at most one in-flight [`SmoothScroll`], identified by a
//! [`ScrollTask`] handle. Starting a new scroll explicitly cancels the old
//! task; a cancelled task never produces another step.
//!
//! The navigator itself writes nothing. The controller feeds it frame
//! timestamps and applies the returned positions through the scroll bridge.

use core::time::Duration;

use tracing::trace;

use crate::animation::SmoothScroll;

/// Default programmatic scroll duration.
pub const DEFAULT_SCROLL_DURATION: Duration = Duration::from_millis(400);

/// Handle to one programmatic scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrollTask(u64);

impl ScrollTask {
    /// Monotonic task id, unique per navigator.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Position produced for one animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollStep {
    pub task: ScrollTask,
    pub position: f64,
    pub finished: bool,
}

/// Drives smooth scrolls and remembers a deferred hash target.
#[derive(Debug)]
pub struct AnchorNavigator {
    duration: Duration,
    active: Option<(ScrollTask, SmoothScroll)>,
    next_id: u64,
    pending_hash: Option<String>,
    superseded: u64,
}

impl AnchorNavigator {
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            active: None,
            next_id: 1,
            pending_hash: None,
            superseded: 0,
        }
    }

    /// Configured animation duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Start a scroll from `from` to `to` at host time `now`.
    ///
    /// Any in-flight task is cancelled first.
    pub fn begin(&mut self, from: f64, to: f64, now: Duration) -> ScrollTask {
        if let Some(previous) = self.cancel_all() {
            self.superseded += 1;
            trace!(task = previous.id(), "scroll superseded");
        }
        let task = ScrollTask(self.next_id);
        self.next_id += 1;
        self.active = Some((task, SmoothScroll::new(from, to, now, self.duration)));
        task
    }

    /// Advance the in-flight task to `now`.
    ///
    /// Returns `None` when nothing is animating. The finished step clears the
    /// task, so the next call returns `None`.
    pub fn step(&mut self, now: Duration) -> Option<ScrollStep> {
        let (task, tween) = self.active.as_ref()?;
        let sample = tween.sample(now);
        let step = ScrollStep {
            task: *task,
            position: sample.position,
            finished: sample.finished,
        };
        if sample.finished {
            self.active = None;
        }
        Some(step)
    }

    /// Cancel `task` if it is the one in flight.
    pub fn cancel(&mut self, task: ScrollTask) -> bool {
        if self.is_running(task) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Cancel whatever is in flight, returning its handle.
    pub fn cancel_all(&mut self) -> Option<ScrollTask> {
        self.active.take().map(|(task, _)| task)
    }

    /// Whether `task` is still in flight.
    #[must_use]
    pub fn is_running(&self, task: ScrollTask) -> bool {
        self.active.as_ref().is_some_and(|(t, _)| *t == task)
    }

    #[must_use]
    pub fn active_task(&self) -> Option<ScrollTask> {
        self.active.as_ref().map(|(task, _)| *task)
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Destination of the in-flight task.
    #[must_use]
    pub fn target(&self) -> Option<f64> {
        self.active.as_ref().map(|(_, tween)| tween.target())
    }

    /// Number of tasks cancelled by a newer scroll.
    #[must_use]
    pub const fn superseded_count(&self) -> u64 {
        self.superseded
    }

    /// Remember a fragment whose target is not resolvable yet.
    pub fn defer_hash(&mut self, fragment: impl Into<String>) {
        self.pending_hash = Some(fragment.into());
    }

    #[must_use]
    pub fn pending_hash(&self) -> Option<&str> {
        self.pending_hash.as_deref()
    }

    pub fn take_pending_hash(&mut self) -> Option<String> {
        self.pending_hash.take()
    }

    pub fn clear_pending_hash(&mut self) {
        self.pending_hash = None;
    }
}

impl Default for AnchorNavigator {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_DURATION)
    }
}

/// Fragment of a same-page anchor `href`, without the `#`.
///
/// Only hrefs that start with `#` and carry a non-empty fragment qualify.
#[must_use]
pub fn same_page_fragment(href: &str) -> Option<&str> {
    href.trim()
        .strip_prefix('#')
        .filter(|fragment| !fragment.is_empty())
}

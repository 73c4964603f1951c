#![forbid(unsafe_code)]

//! Readiness gate: a join over module loads and image preloads.
//!
//! The site stays on its loading placeholder until every lazily loaded
//! section module has resolved and every preloaded image has either loaded
//! or failed. A broken image counts as settled, so the page can never wedge
//! in the loading state.
//!
//! # Invariants
//!
//! - `is_ready()` becomes `true` exactly once and never reverts.
//! - It never becomes `true` while any tracked slot is unsettled.
//! - Settle order does not matter; repeated settles of a slot are no-ops.

use core::future::Future;

use futures::future::join_all;
use tracing::{debug, info};

/// Outcome of one asynchronous asset load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
}

/// Barrier over a fixed number of independently settling slots.
#[derive(Debug, Clone, Default)]
pub struct JoinBarrier {
    settled: Vec<bool>,
    remaining: usize,
}

impl JoinBarrier {
    /// Create a barrier over `slots` unsettled slots.
    ///
    /// A barrier over zero slots is complete from the start.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            settled: vec![false; slots],
            remaining: slots,
        }
    }

    /// Mark `slot` settled. Returns `true` if this call settled it.
    pub fn settle(&mut self, slot: usize) -> bool {
        match self.settled.get_mut(slot) {
            Some(done) if !*done => {
                *done = true;
                self.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Whether `slot` has settled.
    #[must_use]
    pub fn is_settled(&self, slot: usize) -> bool {
        self.settled.get(slot).copied().unwrap_or(false)
    }

    /// Total slot count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.settled.len()
    }

    /// Whether the barrier tracks no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }

    /// Slots still pending.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Whether every slot has settled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Keyed barrier: slots are addressed by name (module name or image URL).
///
/// Duplicate keys are tracked per occurrence; each settle call consumes the
/// first unsettled occurrence.
#[derive(Debug, Clone, Default)]
struct KeyedBarrier {
    keys: Vec<String>,
    barrier: JoinBarrier,
}

impl KeyedBarrier {
    fn new(keys: Vec<String>) -> Self {
        let barrier = JoinBarrier::new(keys.len());
        Self { keys, barrier }
    }

    fn settle(&mut self, key: &str) -> bool {
        let slot = self
            .keys
            .iter()
            .enumerate()
            .position(|(slot, k)| k == key && !self.barrier.is_settled(slot));
        slot.is_some_and(|slot| self.barrier.settle(slot))
    }
}

/// Progress snapshot for a loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessProgress {
    pub modules_settled: usize,
    pub modules_total: usize,
    pub assets_settled: usize,
    pub assets_total: usize,
}

/// Aggregates module and asset readiness into one monotonic flag.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    modules: KeyedBarrier,
    assets: KeyedBarrier,
    failed_assets: usize,
    ready: bool,
}

impl ReadinessGate {
    /// Track the given module names and image URLs.
    #[must_use]
    pub fn new<M, A>(modules: M, image_urls: A) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let mut gate = Self {
            modules: KeyedBarrier::new(modules.into_iter().map(Into::into).collect()),
            assets: KeyedBarrier::new(image_urls.into_iter().map(Into::into).collect()),
            failed_assets: 0,
            ready: false,
        };
        gate.evaluate();
        gate
    }

    /// Record that module `name` finished loading.
    ///
    /// Returns `true` only for the call that made the gate ready.
    pub fn module_loaded(&mut self, name: &str) -> bool {
        if !self.modules.settle(name) {
            debug!(module = name, "ignoring unknown or repeated module load");
            return false;
        }
        self.evaluate()
    }

    /// Record that image `url` loaded or failed. Both count as settled.
    ///
    /// Returns `true` only for the call that made the gate ready.
    pub fn asset_settled(&mut self, url: &str, outcome: LoadOutcome) -> bool {
        if !self.assets.settle(url) {
            return false;
        }
        if outcome == LoadOutcome::Failed {
            self.failed_assets += 1;
            debug!(url, "image failed to load; counting as settled");
        }
        self.evaluate()
    }

    /// Whether the page may leave its loading state.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of images that settled by failing.
    #[must_use]
    pub const fn failed_assets(&self) -> usize {
        self.failed_assets
    }

    /// Current progress counts.
    #[must_use]
    pub fn progress(&self) -> ReadinessProgress {
        let modules = &self.modules.barrier;
        let assets = &self.assets.barrier;
        ReadinessProgress {
            modules_settled: modules.len() - modules.remaining(),
            modules_total: modules.len(),
            assets_settled: assets.len() - assets.remaining(),
            assets_total: assets.len(),
        }
    }

    fn evaluate(&mut self) -> bool {
        if self.ready {
            return false;
        }
        if self.modules.barrier.is_complete() && self.assets.barrier.is_complete() {
            self.ready = true;
            info!(
                modules = self.modules.barrier.len(),
                assets = self.assets.barrier.len(),
                failed_assets = self.failed_assets,
                "readiness gate open"
            );
            return true;
        }
        false
    }
}

/// Wait until every future has produced an output, whatever it is.
///
/// Returns the number of futures joined. Outputs are discarded: a failed
/// load counts as settled just like a successful one.
pub async fn settle_all<I>(futures: I) -> usize
where
    I: IntoIterator,
    I::Item: Future,
{
    join_all(futures).await.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::FutureExt;

    #[test]
    fn barrier_settles_each_slot_once() {
        let mut b = JoinBarrier::new(2);
        assert!(b.settle(1));
        assert!(!b.settle(1));
        assert!(!b.settle(9));
        assert!(!b.is_complete());
        assert!(b.settle(0));
        assert!(b.is_complete());
    }

    #[test]
    fn empty_gate_is_ready_immediately() {
        let gate = ReadinessGate::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(gate.is_ready());
    }

    #[test]
    fn ready_requires_modules_and_assets() {
        let mut gate = ReadinessGate::new(["home", "about"], ["/a.webp"]);
        assert!(!gate.module_loaded("home"));
        assert!(!gate.asset_settled("/a.webp", LoadOutcome::Loaded));
        assert!(!gate.is_ready());
        assert!(gate.module_loaded("about"));
        assert!(gate.is_ready());
    }

    #[test]
    fn failed_images_count_as_settled() {
        let mut gate = ReadinessGate::new(Vec::<String>::new(), ["/a.webp", "/b.webp"]);
        assert!(!gate.asset_settled("/a.webp", LoadOutcome::Failed));
        assert!(gate.asset_settled("/b.webp", LoadOutcome::Failed));
        assert!(gate.is_ready());
        assert_eq!(gate.failed_assets(), 2);
    }

    #[test]
    fn duplicate_urls_are_tracked_per_occurrence() {
        let mut gate = ReadinessGate::new(Vec::<String>::new(), ["/a.webp", "/a.webp"]);
        assert!(!gate.asset_settled("/a.webp", LoadOutcome::Loaded));
        assert!(!gate.is_ready());
        assert!(gate.asset_settled("/a.webp", LoadOutcome::Loaded));
    }

    #[test]
    fn unknown_and_repeated_settles_are_ignored() {
        let mut gate = ReadinessGate::new(["home"], ["/a.webp"]);
        assert!(!gate.module_loaded("footer"));
        assert!(!gate.asset_settled("/nope.webp", LoadOutcome::Loaded));
        assert!(!gate.asset_settled("/a.webp", LoadOutcome::Loaded));
        assert!(!gate.asset_settled("/a.webp", LoadOutcome::Loaded));
        assert!(!gate.is_ready());
        let progress = gate.progress();
        assert_eq!(progress.assets_settled, 1);
        assert_eq!(progress.modules_settled, 0);
    }

    #[test]
    fn ready_transition_is_reported_once() {
        let mut gate = ReadinessGate::new(["home"], Vec::<String>::new());
        assert!(gate.module_loaded("home"));
        assert!(!gate.module_loaded("home"));
        assert!(gate.is_ready());
    }

    #[test]
    fn settle_all_waits_for_every_future() {
        let (tx_a, rx_a) = oneshot::channel::<LoadOutcome>();
        let (tx_b, rx_b) = oneshot::channel::<LoadOutcome>();
        let mut joined = Box::pin(settle_all([rx_a, rx_b]));

        assert!((&mut joined).now_or_never().is_none());
        tx_a.send(LoadOutcome::Failed).unwrap();
        assert!((&mut joined).now_or_never().is_none());
        // A dropped sender is still a settled outcome.
        drop(tx_b);
        assert_eq!(block_on(joined), 2);
    }
}

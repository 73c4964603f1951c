#![forbid(unsafe_code)]

//! Scroll bridge: the outer document scroll drives an inner container.
//!
//! The site's content lives in an `overflow: hidden` container so reveal
//! animations can key off intersection observers inside it. The bridge makes
//! that container behave like normal page content:
//!
//! - **Height projection**: the body is sized to `container.scrollHeight +
//!   margin`, giving the window enough native scroll range.
//! - **Sync loop**: every window `scroll` schedules one write of
//!   `container.scrollTop = window.scrollY`, coalesced to at most one
//!   outstanding animation frame.
//! - **Layout tracking**: subtree mutations and resizes re-project the height
//!   after a debounce window. A burst that included a resize is reported as
//!   such so the caller can re-anchor the location hash.
//!
//! # Lifecycle
//!
//! The bridge attaches only when it is both ready and has a container.
//! Everything acquired on attach (listeners, observers, the pending frame,
//! the debounce timer, and the body height override) is owned by a private
//! attachment guard whose `Drop` releases it. Detaching is just dropping that
//! guard, so no path can leave the page mis-sized.

use core::time::Duration;

use tracing::{debug, trace};

use crate::debounce::Debouncer;
use crate::host::{BodyHeight, EventSource, ScrollHost};

/// Default extra body height below the projected content, in CSS pixels.
pub const DEFAULT_MARGIN_PX: f64 = 300.0;

/// Default debounce window for layout-triggered recomputation.
pub const DEFAULT_LAYOUT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Bridge tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeConfig {
    /// Extra body height added below the container content.
    pub margin_px: f64,
    /// Quiet window before a layout change re-projects the height.
    pub layout_debounce: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            layout_debounce: DEFAULT_LAYOUT_DEBOUNCE,
        }
    }
}

/// Result of a readiness or container change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachChange {
    Unchanged,
    Attached,
    Detached,
    /// Moved from one container to another while ready.
    Reattached,
}

/// What kind of layout change a host observer reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutChange {
    Mutation,
    Resize,
}

/// A debounced height recomputation that ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relayout {
    /// Newly projected body height.
    pub height: f64,
    /// Changes collapsed into this recomputation.
    pub collapsed: u32,
    /// At least one of them was a container resize.
    pub resized: bool,
}

/// Everything held while attached. Dropping it releases all of it.
struct Attachment<H: ScrollHost> {
    host: H,
    container: H::Element,
    subscriptions: Vec<H::Subscription>,
    frame: Option<H::FrameRequest>,
    layout_timer: Option<H::Timer>,
    debouncer: Debouncer,
    burst_resized: bool,
    sync_pending: bool,
    inner_scroll_top: f64,
    document_height: Option<f64>,
    saved_body_height: BodyHeight,
}

impl<H: ScrollHost> Attachment<H> {
    fn acquire(host: &H, container: H::Element, config: &BridgeConfig) -> Self {
        let saved_body_height = host.body_height();
        let subscriptions = EventSource::ALL
            .into_iter()
            .map(|source| host.subscribe(source, &container))
            .collect();
        let inner_scroll_top = host.scroll_top(&container);
        Self {
            host: host.clone(),
            container,
            subscriptions,
            frame: None,
            layout_timer: None,
            debouncer: Debouncer::new(config.layout_debounce),
            burst_resized: false,
            sync_pending: false,
            inner_scroll_top,
            document_height: None,
            saved_body_height,
        }
    }

    fn request_frame(&mut self) -> bool {
        if self.frame.is_some() {
            return false;
        }
        self.frame = Some(self.host.request_frame());
        true
    }

    fn project_height(&mut self, margin_px: f64) -> f64 {
        let height = self.host.scroll_height(&self.container) + margin_px;
        self.host.set_body_height(BodyHeight::Pixels(height));
        self.document_height = Some(height);
        height
    }
}

impl<H: ScrollHost> Drop for Attachment<H> {
    fn drop(&mut self) {
        self.subscriptions.clear();
        self.frame = None;
        self.layout_timer = None;
        self.host
            .set_body_height(core::mem::take(&mut self.saved_body_height));
    }
}

/// Keeps an inner scroll container in step with the window scroll.
pub struct ScrollBridge<H: ScrollHost> {
    host: H,
    config: BridgeConfig,
    container: Option<H::Element>,
    ready: bool,
    attachment: Option<Attachment<H>>,
}

impl<H: ScrollHost> ScrollBridge<H> {
    /// Create a detached bridge.
    #[must_use]
    pub fn new(host: H, config: BridgeConfig) -> Self {
        Self {
            host,
            config,
            container: None,
            ready: false,
            attachment: None,
        }
    }

    /// The host this bridge writes through.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Update the readiness signal. `false` tears down an attachment.
    pub fn set_ready(&mut self, ready: bool) -> AttachChange {
        self.ready = ready;
        self.reconcile()
    }

    /// Provide (or clear, on unmount) the container element.
    pub fn set_container(&mut self, container: Option<H::Element>) -> AttachChange {
        self.container = container;
        self.reconcile()
    }

    /// Whether listeners and the height override are currently held.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// The container the bridge is attached to.
    #[must_use]
    pub fn attached_container(&self) -> Option<&H::Element> {
        self.attachment.as_ref().map(|a| &a.container)
    }

    /// Last value written to (or read from) the container's scroll offset.
    #[must_use]
    pub fn inner_scroll_top(&self) -> f64 {
        self.attachment.as_ref().map_or(0.0, |a| a.inner_scroll_top)
    }

    /// Projected body height, while attached.
    #[must_use]
    pub fn document_height(&self) -> Option<f64> {
        self.attachment.as_ref().and_then(|a| a.document_height)
    }

    /// Whether an animation frame is outstanding.
    #[must_use]
    pub fn has_pending_frame(&self) -> bool {
        self.attachment.as_ref().is_some_and(|a| a.frame.is_some())
    }

    /// Whether a passive sync write is waiting for the next frame.
    #[must_use]
    pub fn has_pending_sync(&self) -> bool {
        self.attachment.as_ref().is_some_and(|a| a.sync_pending)
    }

    /// Whether a layout recomputation is waiting out its debounce window.
    #[must_use]
    pub fn has_pending_layout(&self) -> bool {
        self.attachment
            .as_ref()
            .is_some_and(|a| a.debouncer.is_pending())
    }

    /// Release everything acquired on attach.
    pub fn detach(&mut self) -> bool {
        match self.attachment.take() {
            Some(attachment) => {
                debug!(
                    restored = ?attachment.saved_body_height,
                    "scroll bridge detached"
                );
                drop(attachment);
                true
            }
            None => false,
        }
    }

    /// Window `scroll` event.
    ///
    /// With `suppressed` set (a programmatic scroll owns the container), the
    /// event is ignored. Otherwise a sync write is scheduled for the next
    /// frame; returns `true` if that needed a new frame request.
    pub fn on_window_scroll(&mut self, suppressed: bool) -> bool {
        let Some(attachment) = self.attachment.as_mut() else {
            return false;
        };
        if suppressed {
            trace!("window scroll ignored during programmatic scroll");
            return false;
        }
        attachment.sync_pending = true;
        attachment.request_frame()
    }

    /// Request an animation frame unless one is already outstanding.
    pub fn request_frame(&mut self) -> bool {
        self.attachment
            .as_mut()
            .is_some_and(Attachment::request_frame)
    }

    /// The outstanding frame fired; forget its request handle.
    pub fn frame_fired(&mut self) {
        if let Some(attachment) = self.attachment.as_mut() {
            attachment.frame = None;
        }
    }

    /// Perform the pending passive sync, if any.
    ///
    /// Returns the offset written.
    pub fn flush_sync(&mut self) -> Option<f64> {
        let attachment = self.attachment.as_mut()?;
        if !core::mem::take(&mut attachment.sync_pending) {
            return None;
        }
        let y = attachment.host.window_scroll_y();
        attachment.host.set_scroll_top(&attachment.container, y);
        attachment.inner_scroll_top = y;
        trace!(y, "passive scroll sync");
        Some(y)
    }

    /// Drop a pending passive sync without writing.
    pub fn discard_sync(&mut self) {
        if let Some(attachment) = self.attachment.as_mut() {
            attachment.sync_pending = false;
        }
    }

    /// Write the container scroll offset on behalf of a programmatic scroll.
    pub fn write_inner(&mut self, top: f64) {
        if let Some(attachment) = self.attachment.as_mut() {
            attachment.host.set_scroll_top(&attachment.container, top);
            attachment.inner_scroll_top = top;
        }
    }

    /// Move the window so the outer scroll matches the inner one again.
    pub fn align_outer(&mut self, y: f64) {
        if let Some(attachment) = self.attachment.as_ref() {
            attachment.host.set_window_scroll_y(y);
        }
    }

    /// Re-project the body height from the container's content height.
    pub fn project_height(&mut self) -> Option<f64> {
        let margin = self.config.margin_px;
        self.attachment
            .as_mut()
            .map(|attachment| attachment.project_height(margin))
    }

    /// Subtree mutation or container resize: (re-)arm the debounce timer.
    pub fn on_layout_change(&mut self, change: LayoutChange) {
        let Some(attachment) = self.attachment.as_mut() else {
            return;
        };
        let now = attachment.host.now();
        let delay = attachment.debouncer.trigger(now);
        attachment.burst_resized |= change == LayoutChange::Resize;
        // Replacing the guard clears the previous timeout.
        attachment.layout_timer = Some(attachment.host.set_timeout(delay));
    }

    /// Debounce timer fired. Returns the recomputation if the burst was due.
    pub fn on_timer(&mut self) -> Option<Relayout> {
        let margin = self.config.margin_px;
        let attachment = self.attachment.as_mut()?;
        let now = attachment.host.now();
        let Some(collapsed) = attachment.debouncer.poll(now) else {
            // Fired a little early: wait out the remainder.
            if let Some(remaining) = attachment.debouncer.time_until_fire(now) {
                attachment.layout_timer = Some(attachment.host.set_timeout(remaining));
            }
            return None;
        };
        attachment.layout_timer = None;
        let resized = core::mem::take(&mut attachment.burst_resized);
        let height = attachment.project_height(margin);
        debug!(height, collapsed, resized, "layout change re-projected body height");
        Some(Relayout {
            height,
            collapsed,
            resized,
        })
    }

    fn reconcile(&mut self) -> AttachChange {
        let wanted = if self.ready { self.container.clone() } else { None };
        let current = self.attachment.as_ref().map(|a| a.container.clone());

        let swapped = current.is_some() && current != wanted;
        if swapped {
            self.detach();
        }
        match wanted {
            Some(container) if self.attachment.is_none() => {
                self.attach(container);
                if swapped {
                    AttachChange::Reattached
                } else {
                    AttachChange::Attached
                }
            }
            _ if swapped => AttachChange::Detached,
            _ => AttachChange::Unchanged,
        }
    }

    fn attach(&mut self, container: H::Element) {
        let mut attachment = Attachment::acquire(&self.host, container, &self.config);
        let height = attachment.project_height(self.config.margin_px);
        attachment.sync_pending = true;
        attachment.request_frame();
        debug!(height, "scroll bridge attached");
        self.attachment = Some(attachment);
    }
}

impl<H: ScrollHost> Drop for ScrollBridge<H> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, NodeId};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn attached(scroll_height: f64) -> (HeadlessHost, NodeId, ScrollBridge<HeadlessHost>) {
        let host = HeadlessHost::new();
        let container = host.create_container(scroll_height);
        let mut bridge = ScrollBridge::new(host.clone(), BridgeConfig::default());
        assert_eq!(bridge.set_container(Some(container)), AttachChange::Unchanged);
        assert_eq!(bridge.set_ready(true), AttachChange::Attached);
        (host, container, bridge)
    }

    fn held(host: &HeadlessHost) -> (usize, usize, usize) {
        (host.live_subscriptions(), host.live_frames(), host.live_timers())
    }

    #[test]
    fn attach_schedules_initial_sync() {
        let (host, container, mut bridge) = attached(1000.0);
        assert!(bridge.has_pending_frame());
        assert!(bridge.has_pending_sync());
        assert!(!bridge.has_pending_layout());

        host.user_scroll(250.0);
        bridge.frame_fired();
        assert!(!bridge.has_pending_frame());
        assert_eq!(bridge.flush_sync(), Some(250.0));
        assert!(!bridge.has_pending_sync());
        assert_eq!(host.scroll_top(&container), 250.0);
        assert_eq!(bridge.flush_sync(), None);
    }

    #[test]
    fn unready_tears_everything_down() {
        let (host, _, mut bridge) = attached(1000.0);
        bridge.on_layout_change(LayoutChange::Resize);
        assert_eq!(held(&host), (5, 1, 1));
        assert_eq!(host.body_height(), BodyHeight::Pixels(1300.0));

        assert_eq!(bridge.set_ready(false), AttachChange::Detached);
        assert!(!bridge.is_attached());
        assert_eq!(held(&host), (0, 0, 0));
        assert_eq!(host.body_height(), BodyHeight::Auto);
        assert!(!bridge.has_pending_frame());
        assert!(!bridge.has_pending_layout());
        assert_eq!(bridge.set_ready(false), AttachChange::Unchanged);
    }

    #[test]
    fn container_swap_moves_attachment() {
        let (host, first, mut bridge) = attached(1000.0);
        let second = host.create_container(1800.0);

        assert_eq!(bridge.set_container(Some(second)), AttachChange::Reattached);
        assert_eq!(bridge.attached_container(), Some(&second));
        assert_eq!(bridge.document_height(), Some(2100.0));
        assert_eq!(host.body_height(), BodyHeight::Pixels(2100.0));
        assert_eq!(held(&host), (5, 1, 0));

        assert_eq!(bridge.set_container(Some(second)), AttachChange::Unchanged);
        host.mutate(first);
        assert_eq!(host.queued_events(), 0);
    }

    #[test]
    fn early_timer_rearms_for_the_remainder() {
        let (host, container, mut bridge) = attached(1000.0);
        bridge.on_layout_change(LayoutChange::Mutation);
        host.advance_clock(ms(100));
        bridge.on_layout_change(LayoutChange::Mutation);

        host.advance_clock(ms(100));
        assert_eq!(bridge.on_timer(), None);
        assert!(bridge.has_pending_layout());
        assert_eq!(host.live_timers(), 1);

        host.set_scroll_height(container, 1200.0);
        host.advance_clock(ms(50));
        assert_eq!(
            bridge.on_timer(),
            Some(Relayout {
                height: 1500.0,
                collapsed: 2,
                resized: false,
            })
        );
        assert!(!bridge.has_pending_layout());
        assert_eq!(host.live_timers(), 0);
    }

    #[test]
    fn resize_anywhere_in_a_burst_is_reported() {
        let (host, _, mut bridge) = attached(1000.0);
        bridge.on_layout_change(LayoutChange::Resize);
        bridge.on_layout_change(LayoutChange::Mutation);
        host.advance_clock(ms(150));
        assert!(bridge.on_timer().is_some_and(|r| r.resized));

        bridge.on_layout_change(LayoutChange::Mutation);
        host.advance_clock(ms(150));
        assert!(bridge.on_timer().is_some_and(|r| !r.resized));
    }

    #[test]
    fn dropping_the_bridge_releases_host_resources() {
        let (host, _, mut bridge) = attached(1000.0);
        bridge.on_layout_change(LayoutChange::Resize);
        assert_eq!(held(&host), (5, 1, 1));
        drop(bridge);
        assert_eq!(held(&host), (0, 0, 0));
        assert_eq!(host.body_height(), BodyHeight::Auto);
    }

    #[test]
    fn non_pixel_body_height_survives_detach() {
        let host = HeadlessHost::new();
        host.set_body_height(BodyHeight::from_css("100vh"));
        let container = host.create_container(1000.0);
        let mut bridge = ScrollBridge::new(host.clone(), BridgeConfig::default());
        bridge.set_ready(true);
        bridge.set_container(Some(container));
        assert_eq!(host.body_height(), BodyHeight::Pixels(1300.0));

        assert!(bridge.detach());
        assert_eq!(host.body_height(), BodyHeight::Css("100vh".into()));
        assert_eq!(host.body_height().to_css(), "100vh");
    }
}

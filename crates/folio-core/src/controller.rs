#![forbid(unsafe_code)]

//! Top-level owner of the scroll machinery.
//!
//! [`SiteController`] ties the section registry, the readiness gate, the
//! scroll bridge and the anchor navigator together behind one event entry
//! point, [`SiteController::handle`]. Hosts forward every callback they
//! receive; section components call [`SiteController::register`] on mount;
//! navigation UI calls [`SiteController::scroll_to`].
//!
//! # Invariants
//!
//! - While attached and not animating, the container's scroll offset equals
//!   the window scroll offset after the next animation frame.
//! - While a programmatic scroll runs, passive sync is suppressed: window
//!   scroll events are ignored and frames only advance the animation.
//! - When a programmatic scroll finishes (or is cancelled), the window is
//!   moved to the container's offset so the first invariant holds again.
//! - Detaching cancels any running scroll.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Section not registered or unmounted | `scroll_to` returns `None` |
//! | Hash target not resolvable yet | Stored, retried on registry change or attach |
//! | Click on an unresolvable fragment | Browser default runs |
//! | Events after detach | Ignored; no DOM writes |

use tracing::{debug, trace};

use crate::bridge::{AttachChange, LayoutChange, ScrollBridge};
use crate::config::SiteConfig;
use crate::host::{Disposition, HostEvent, ScrollHost};
use crate::navigator::{AnchorNavigator, ScrollTask, same_page_fragment};
use crate::readiness::{LoadOutcome, ReadinessGate, ReadinessProgress};
use crate::registry::SectionRegistry;
use crate::section::Section;

/// Snapshot of per-page scroll state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollState {
    /// Pixels scrolled inside the container.
    pub inner_scroll_top: f64,
    /// Height applied to the document body, `None` while detached.
    pub document_height: Option<f64>,
    /// The programmatic scroll in flight, if any.
    pub active_animation: Option<ScrollTask>,
    /// Fragment waiting for its target to be registered.
    pub pending_hash_target: Option<String>,
}

/// Scroll-synchronized section navigation for one page view.
pub struct SiteController<H: ScrollHost> {
    host: H,
    registry: SectionRegistry<H::Element>,
    gate: ReadinessGate,
    bridge: ScrollBridge<H>,
    navigator: AnchorNavigator,
}

impl<H: ScrollHost> SiteController<H> {
    /// Create a controller gated on `config.modules` and `image_urls`.
    pub fn new<I>(host: H, config: &SiteConfig, image_urls: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let gate = ReadinessGate::new(config.modules.iter().cloned(), image_urls);
        let mut bridge = ScrollBridge::new(host.clone(), config.bridge_config());
        bridge.set_ready(gate.is_ready());
        Self {
            host,
            registry: SectionRegistry::new(),
            gate,
            bridge,
            navigator: AnchorNavigator::new(config.scroll_duration()),
        }
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub const fn registry(&self) -> &SectionRegistry<H::Element> {
        &self.registry
    }

    /// Whether the loading placeholder may be replaced by content.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    #[must_use]
    pub fn progress(&self) -> ReadinessProgress {
        self.gate.progress()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.bridge.is_attached()
    }

    // ---- section lifecycle ----

    /// A section component mounted with root `element`.
    pub fn register(&mut self, section: Section, element: H::Element) -> Option<H::Element> {
        let previous = self.registry.register(section, element);
        trace!(%section, generation = self.registry.generation(), "section registered");
        self.retry_pending_hash();
        previous
    }

    /// A section component unmounted.
    pub fn unregister(&mut self, section: Section) -> Option<H::Element> {
        self.registry.unregister(section)
    }

    /// The scroll container mounted (`Some`) or unmounted (`None`).
    pub fn set_container(&mut self, container: Option<H::Element>) {
        let change = self.bridge.set_container(container);
        self.on_attach_change(change);
    }

    // ---- readiness ----

    /// A lazily loaded module resolved. Returns `true` if this made the page ready.
    pub fn module_loaded(&mut self, name: &str) -> bool {
        let opened = self.gate.module_loaded(name);
        if opened {
            self.open_gate();
        }
        opened
    }

    /// A preloaded image loaded or failed. Returns `true` if this made the page ready.
    pub fn asset_settled(&mut self, url: &str, outcome: LoadOutcome) -> bool {
        let opened = self.gate.asset_settled(url, outcome);
        if opened {
            self.open_gate();
        }
        opened
    }

    // ---- navigation ----

    /// Smoothly scroll the container to `section`.
    ///
    /// Returns `None` (and does nothing) when the section is not mounted or
    /// the bridge is not attached.
    pub fn scroll_to(&mut self, section: Section) -> Option<ScrollTask> {
        let element = self
            .registry
            .resolve(section)
            .filter(|element| self.host.is_connected(element))?
            .clone();
        self.scroll_to_element(&element)
    }

    /// Scroll to the element a URL fragment names.
    ///
    /// A fragment whose target cannot be resolved yet is remembered and
    /// retried when a section registers or the bridge attaches.
    pub fn scroll_to_hash(&mut self, fragment: &str) -> Option<ScrollTask> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if fragment.is_empty() {
            self.navigator.clear_pending_hash();
            return None;
        }
        let task = self
            .resolve_fragment(fragment)
            .and_then(|element| self.scroll_to_element(&element));
        match task {
            Some(task) => {
                self.navigator.clear_pending_hash();
                Some(task)
            }
            None => {
                debug!(fragment, "hash target not resolvable yet; deferring");
                self.navigator.defer_hash(fragment);
                None
            }
        }
    }

    /// Stop the running programmatic scroll where it is.
    pub fn cancel_scroll(&mut self) -> Option<ScrollTask> {
        let task = self.navigator.cancel_all()?;
        let top = self.bridge.inner_scroll_top();
        self.bridge.align_outer(top);
        Some(task)
    }

    /// Whether `task` is still animating.
    #[must_use]
    pub fn is_running(&self, task: ScrollTask) -> bool {
        self.navigator.is_running(task)
    }

    #[must_use]
    pub fn scroll_state(&self) -> ScrollState {
        ScrollState {
            inner_scroll_top: self.bridge.inner_scroll_top(),
            document_height: self.bridge.document_height(),
            active_animation: self.navigator.active_task(),
            pending_hash_target: self.navigator.pending_hash().map(str::to_owned),
        }
    }

    /// Tear down: forget the container, release every host resource and
    /// restore the body height.
    pub fn detach(&mut self) -> bool {
        let attached = self.bridge.is_attached();
        self.set_container(None);
        attached
    }

    // ---- host callbacks ----

    /// Entry point for every host callback.
    pub fn handle(&mut self, event: HostEvent) -> Disposition {
        match event {
            HostEvent::WindowScroll => {
                self.bridge.on_window_scroll(self.navigator.is_animating());
            }
            HostEvent::AnimationFrame => self.on_frame(),
            HostEvent::Timer => {
                if self.bridge.on_timer().is_some_and(|relayout| relayout.resized) {
                    self.scroll_to_location_hash();
                }
            }
            HostEvent::AnchorClick { href } => return self.on_anchor_click(&href),
            HostEvent::HashChange => {
                self.scroll_to_location_hash();
            }
            HostEvent::ContainerMutation => self.bridge.on_layout_change(LayoutChange::Mutation),
            HostEvent::ContainerResize => self.bridge.on_layout_change(LayoutChange::Resize),
        }
        Disposition::Default
    }

    fn on_frame(&mut self) {
        self.bridge.frame_fired();
        if !self.bridge.is_attached() {
            return;
        }
        if !self.navigator.is_animating() {
            self.bridge.flush_sync();
            return;
        }
        self.bridge.discard_sync();
        let Some(step) = self.navigator.step(self.host.now()) else {
            return;
        };
        self.bridge.write_inner(step.position);
        if step.finished {
            trace!(task = step.task.id(), position = step.position, "scroll finished");
            self.bridge.align_outer(step.position);
        } else {
            self.bridge.request_frame();
        }
    }

    fn on_anchor_click(&mut self, href: &str) -> Disposition {
        let Some(fragment) = same_page_fragment(href) else {
            return Disposition::Default;
        };
        let Some(element) = self.resolve_fragment(fragment) else {
            return Disposition::Default;
        };
        if self.scroll_to_element(&element).is_none() {
            return Disposition::Default;
        }
        self.navigator.clear_pending_hash();
        self.host.push_hash(fragment);
        Disposition::PreventDefault
    }

    fn scroll_to_element(&mut self, element: &H::Element) -> Option<ScrollTask> {
        let container = self.bridge.attached_container()?.clone();
        let target = self.host.offset_within(element, &container)?.max(0.0);
        let from = self.host.scroll_top(&container);
        let task = self.navigator.begin(from, target, self.host.now());
        self.bridge.discard_sync();
        self.bridge.request_frame();
        debug!(task = task.id(), from, target, "smooth scroll started");
        Some(task)
    }

    /// Look a fragment up: DOM id inside the container first, then section
    /// name or DOM id through the registry.
    fn resolve_fragment(&self, fragment: &str) -> Option<H::Element> {
        let container = self.bridge.attached_container()?;
        self.host.find_in(container, fragment).or_else(|| {
            Section::from_fragment(fragment)
                .and_then(|section| self.registry.resolve(section))
                .filter(|element| self.host.is_connected(element))
                .cloned()
        })
    }

    fn scroll_to_location_hash(&mut self) -> Option<ScrollTask> {
        match self.host.location_hash() {
            Some(fragment) => self.scroll_to_hash(&fragment),
            None => {
                self.navigator.clear_pending_hash();
                None
            }
        }
    }

    fn retry_pending_hash(&mut self) {
        if !self.bridge.is_attached() {
            return;
        }
        if let Some(fragment) = self.navigator.take_pending_hash() {
            self.scroll_to_hash(&fragment);
        }
    }

    fn open_gate(&mut self) {
        let change = self.bridge.set_ready(true);
        self.on_attach_change(change);
    }

    fn on_attach_change(&mut self, change: AttachChange) {
        match change {
            AttachChange::Attached => {
                if self.host.location_hash().is_some() {
                    self.scroll_to_location_hash();
                } else {
                    self.retry_pending_hash();
                }
            }
            AttachChange::Detached => {
                if let Some(task) = self.navigator.cancel_all() {
                    debug!(task = task.id(), "scroll cancelled by detach");
                }
            }
            AttachChange::Reattached => {
                if let Some(task) = self.navigator.cancel_all() {
                    debug!(task = task.id(), "scroll cancelled by container swap");
                }
                self.on_attach_change(AttachChange::Attached);
            }
            AttachChange::Unchanged => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DomWrite, HeadlessHost, NodeId};
    use crate::host::BodyHeight;
    use core::time::Duration;

    struct Page {
        host: HeadlessHost,
        container: NodeId,
        sections: [NodeId; 4],
        controller: SiteController<HeadlessHost>,
    }

    fn page() -> Page {
        let host = HeadlessHost::new();
        let container = host.create_container(2000.0);
        let sections = [
            host.create_element(container, Some("home"), 0.0),
            host.create_element(container, Some("about"), 600.0),
            host.create_element(container, Some("projects"), 1200.0),
            host.create_element(container, Some("tes"), 1800.0),
        ];
        let config = SiteConfig::default().with_modules(Vec::<String>::new());
        let controller = SiteController::new(host.clone(), &config, Vec::<String>::new());
        Page {
            host,
            container,
            sections,
            controller,
        }
    }

    fn mount(p: &mut Page) {
        for (section, element) in Section::ALL.into_iter().zip(p.sections) {
            p.controller.register(section, element);
        }
        p.controller.set_container(Some(p.container));
    }

    #[test]
    fn no_attach_until_ready() {
        let host = HeadlessHost::new();
        let container = host.create_container(1000.0);
        let config = SiteConfig::default().with_modules(["home"]);
        let mut ctl = SiteController::new(host.clone(), &config, ["/a.webp"]);
        ctl.set_container(Some(container));
        assert!(!ctl.is_attached());
        assert_eq!(host.live_subscriptions(), 0);

        assert!(!ctl.module_loaded("home"));
        assert!(!ctl.is_attached());
        assert!(ctl.asset_settled("/a.webp", LoadOutcome::Failed));
        assert!(ctl.is_attached());
        assert_eq!(host.live_subscriptions(), 5);
    }

    #[test]
    fn attach_projects_height_and_syncs() {
        let mut p = page();
        mount(&mut p);
        assert_eq!(p.host.body_height(), BodyHeight::Pixels(2300.0));
        assert_eq!(p.controller.scroll_state().document_height, Some(2300.0));

        p.host.user_scroll(1000.0);
        p.host.advance_frame(&mut p.controller);
        assert_eq!(p.host.scroll_top(&p.container), 1000.0);
    }

    #[test]
    fn scroll_to_unregistered_section_is_noop() {
        let mut p = page();
        p.controller.set_container(Some(p.container));
        p.host.take_writes();
        assert_eq!(p.controller.scroll_to(Section::About), None);
        assert!(p.host.writes().is_empty());
    }

    #[test]
    fn scroll_to_unmounted_element_is_noop() {
        let mut p = page();
        mount(&mut p);
        p.host.remove_element(p.sections[2]);
        assert_eq!(p.controller.scroll_to(Section::Projects), None);
    }

    #[test]
    fn anchor_click_animates_and_pushes_hash() {
        let mut p = page();
        mount(&mut p);
        let disposition = p.host.click(&mut p.controller, "#about");
        assert_eq!(disposition, Disposition::PreventDefault);
        assert_eq!(p.host.history(), vec!["about".to_string()]);

        p.host.run_for(&mut p.controller, Duration::from_millis(416));
        assert_eq!(p.host.scroll_top(&p.container), 600.0);
        assert_eq!(p.host.window_scroll_y(), 600.0);
        assert_eq!(p.controller.scroll_state().active_animation, None);
    }

    #[test]
    fn unresolvable_click_keeps_browser_default() {
        let mut p = page();
        mount(&mut p);
        assert_eq!(p.host.click(&mut p.controller, "#blog"), Disposition::Default);
        assert_eq!(p.host.click(&mut p.controller, "/cv.pdf"), Disposition::Default);
    }

    #[test]
    fn passive_scroll_is_ignored_while_animating() {
        let mut p = page();
        mount(&mut p);
        p.host.advance_frame(&mut p.controller);
        let task = p.controller.scroll_to(Section::Projects).unwrap();
        p.host.advance_frame(&mut p.controller);

        p.host.user_scroll(50.0);
        p.host.advance_frame(&mut p.controller);
        let writes = p.host.take_writes();
        assert!(!writes.contains(&DomWrite::ScrollTop {
            element: p.container,
            top: 50.0
        }));
        assert!(p.controller.is_running(task));
    }

    #[test]
    fn hash_waits_for_late_registration() {
        let mut p = page();
        p.host.set_initial_hash(Some("projects"));
        p.controller.set_container(Some(p.container));
        // `projects` exists in the DOM, so it resolves by id right away.
        assert_eq!(p.controller.scroll_state().pending_hash_target, None);

        p.host.navigate_to_hash("contact");
        p.host.dispatch(&mut p.controller);
        assert_eq!(
            p.controller.scroll_state().pending_hash_target.as_deref(),
            Some("contact")
        );

        p.controller.register(Section::Contact, p.sections[3]);
        let state = p.controller.scroll_state();
        assert_eq!(state.pending_hash_target, None);
        assert!(state.active_animation.is_some());
    }

    #[test]
    fn cancel_scroll_aligns_window() {
        let mut p = page();
        mount(&mut p);
        p.controller.scroll_to(Section::Contact).unwrap();
        p.host.advance(&mut p.controller, Duration::from_millis(200));
        let cancelled = p.controller.cancel_scroll();
        assert!(cancelled.is_some());
        let inner = p.host.scroll_top(&p.container);
        assert_eq!(p.host.window_scroll_y(), inner);
        assert_eq!(p.controller.cancel_scroll(), None);
    }

    #[test]
    fn detach_cancels_animation_and_restores_body() {
        let mut p = page();
        mount(&mut p);
        p.controller.scroll_to(Section::About).unwrap();
        assert!(p.controller.detach());
        assert_eq!(p.host.body_height(), BodyHeight::Auto);
        assert_eq!(p.controller.scroll_state().active_animation, None);
        assert_eq!(p.host.live_subscriptions(), 0);
        assert_eq!(p.host.live_frames(), 0);
        assert!(!p.controller.detach());
    }

    #[test]
    fn container_swap_cancels_running_scroll() {
        let mut p = page();
        mount(&mut p);
        let task = p.controller.scroll_to(Section::Contact).unwrap();
        p.host.advance(&mut p.controller, Duration::from_millis(100));
        assert!(p.host.scroll_top(&p.container) > 0.0);

        let other = p.host.create_container(1500.0);
        p.controller.set_container(Some(other));
        assert!(!p.controller.is_running(task));
        assert_eq!(p.controller.scroll_state().active_animation, None);

        p.host.run_for(&mut p.controller, Duration::from_millis(500));
        assert_eq!(p.host.scroll_top(&other), p.host.window_scroll_y());
        assert_eq!(p.host.scroll_top(&other), 0.0);
    }
}

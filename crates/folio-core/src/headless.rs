#![forbid(unsafe_code)]

//! In-memory [`ScrollHost`] for deterministic simulation.
//!
//! `HeadlessHost` models just enough of a browser page for the scroll core:
//! a tree of elements with offsets and content heights, the window scroll
//! offset, the body's inline height, the URL fragment and session history.
//! Time only moves when the test says so.
//!
//! Every DOM write the core performs is appended to a log ([`DomWrite`]), and
//! every listener, frame request and timer is counted while its guard is
//! alive, so tests can assert that teardown released everything.
//!
//! Events are delivered the way a browser would: only to live listeners, and
//! asynchronously, via [`HeadlessHost::dispatch`] and
//! [`HeadlessHost::advance`].

use core::cell::RefCell;
use core::time::Duration;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use crate::controller::SiteController;
use crate::host::{BodyHeight, Disposition, EventSource, HostEvent, ScrollHost};
use crate::navigator::same_page_fragment;

/// Nominal frame interval used by [`HeadlessHost::advance_frame`].
pub const FRAME: Duration = Duration::from_millis(16);

/// Handle to a simulated element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One recorded DOM mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DomWrite {
    WindowScroll(f64),
    ScrollTop { element: NodeId, top: f64 },
    BodyHeight(BodyHeight),
    PushHash(String),
}

#[derive(Debug)]
struct Node {
    dom_id: Option<String>,
    parent: Option<NodeId>,
    offset_top: f64,
    scroll_top: f64,
    scroll_height: f64,
    connected: bool,
}

#[derive(Debug, Default)]
struct Dom {
    now: Duration,
    nodes: Vec<Node>,
    window_scroll_y: f64,
    body_height: BodyHeight,
    hash: Option<String>,
    history: Vec<String>,
    writes: Vec<DomWrite>,
    next_handle: u64,
    listeners: BTreeMap<u64, (EventSource, NodeId)>,
    frames: BTreeSet<u64>,
    timers: BTreeMap<u64, Duration>,
    queue: VecDeque<HostEvent>,
}

impl Dom {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn is_descendant(&self, element: NodeId, container: NodeId) -> bool {
        let mut cursor = self.node(element).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            if parent == container {
                return true;
            }
            cursor = self.node(parent).and_then(|n| n.parent);
        }
        false
    }

    fn listening(&self, source: EventSource) -> bool {
        self.listeners.values().any(|(s, _)| *s == source)
    }

    fn observing(&self, source: EventSource, container: NodeId) -> bool {
        self.listeners
            .values()
            .any(|(s, target)| *s == source && *target == container)
    }

    fn enqueue_if(&mut self, listening: bool, event: HostEvent) {
        if listening {
            self.queue.push_back(event);
        }
    }
}

/// Shared, single-threaded fake page.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    dom: Rc<RefCell<Dom>>,
}

/// Live listener or observer; dropping it unsubscribes.
#[derive(Debug)]
pub struct HeadlessSubscription {
    id: u64,
    dom: Rc<RefCell<Dom>>,
}

impl Drop for HeadlessSubscription {
    fn drop(&mut self) {
        self.dom.borrow_mut().listeners.remove(&self.id);
    }
}

/// Outstanding frame request; dropping it cancels the frame.
#[derive(Debug)]
pub struct HeadlessFrame {
    id: u64,
    dom: Rc<RefCell<Dom>>,
}

impl Drop for HeadlessFrame {
    fn drop(&mut self) {
        self.dom.borrow_mut().frames.remove(&self.id);
    }
}

/// Armed timeout; dropping it clears the timeout.
#[derive(Debug)]
pub struct HeadlessTimer {
    id: u64,
    dom: Rc<RefCell<Dom>>,
}

impl Drop for HeadlessTimer {
    fn drop(&mut self) {
        self.dom.borrow_mut().timers.remove(&self.id);
    }
}

impl HeadlessHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- page construction ----

    /// Create a detached-from-any-parent scroll container.
    pub fn create_container(&self, scroll_height: f64) -> NodeId {
        self.push_node(Node {
            dom_id: None,
            parent: None,
            offset_top: 0.0,
            scroll_top: 0.0,
            scroll_height,
            connected: true,
        })
    }

    /// Create an element under `parent`, `offset_top` pixels into its content.
    pub fn create_element(&self, parent: NodeId, dom_id: Option<&str>, offset_top: f64) -> NodeId {
        self.push_node(Node {
            dom_id: dom_id.map(str::to_owned),
            parent: Some(parent),
            offset_top,
            scroll_top: 0.0,
            scroll_height: 0.0,
            connected: true,
        })
    }

    /// Remove `element` and its subtree from the document.
    pub fn remove_element(&self, element: NodeId) {
        let mut dom = self.dom.borrow_mut();
        let doomed: Vec<usize> = (0..dom.nodes.len())
            .filter(|&i| i == element.0 || dom.is_descendant(NodeId(i), element))
            .collect();
        for i in doomed {
            dom.nodes[i].connected = false;
        }
    }

    /// Move `element` within its parent without notifying observers.
    pub fn set_offset(&self, element: NodeId, offset_top: f64) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(element.0) {
            node.offset_top = offset_top;
        }
    }

    /// Change content height without notifying observers.
    pub fn set_scroll_height(&self, element: NodeId, scroll_height: f64) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(element.0) {
            node.scroll_height = scroll_height;
        }
    }

    /// Set the fragment the page was loaded with. No event fires.
    pub fn set_initial_hash(&self, fragment: Option<&str>) {
        self.dom.borrow_mut().hash = fragment.map(str::to_owned).filter(|f| !f.is_empty());
    }

    // ---- user and layout activity ----

    /// User scrolls the window to `y`.
    pub fn user_scroll(&self, y: f64) {
        let mut dom = self.dom.borrow_mut();
        if dom.window_scroll_y == y {
            return;
        }
        dom.window_scroll_y = y;
        let listening = dom.listening(EventSource::WindowScroll);
        dom.enqueue_if(listening, HostEvent::WindowScroll);
    }

    /// Children under `container` were added or removed.
    pub fn mutate(&self, container: NodeId) {
        let mut dom = self.dom.borrow_mut();
        let observing = dom.observing(EventSource::ContainerMutation, container);
        dom.enqueue_if(observing, HostEvent::ContainerMutation);
    }

    /// `container`'s content height changed to `scroll_height`.
    pub fn resize(&self, container: NodeId, scroll_height: f64) {
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.nodes.get_mut(container.0) {
            node.scroll_height = scroll_height;
        }
        let observing = dom.observing(EventSource::ContainerResize, container);
        dom.enqueue_if(observing, HostEvent::ContainerResize);
    }

    /// Back/forward navigation to `#fragment`.
    pub fn navigate_to_hash(&self, fragment: &str) {
        let mut dom = self.dom.borrow_mut();
        dom.hash = Some(fragment.to_owned()).filter(|f| !f.is_empty());
        let listening = dom.listening(EventSource::HashChange);
        dom.enqueue_if(listening, HostEvent::HashChange);
    }

    /// Click an anchor carrying `href`.
    ///
    /// Without a click listener, or when the core declines the event, the
    /// browser default runs: a fragment href jumps and updates the hash.
    pub fn click(&self, controller: &mut SiteController<Self>, href: &str) -> Disposition {
        let listening = self.dom.borrow().listening(EventSource::DocumentClick);
        let disposition = if listening {
            controller.handle(HostEvent::AnchorClick {
                href: href.to_owned(),
            })
        } else {
            Disposition::Default
        };
        if disposition == Disposition::Default {
            if let Some(fragment) = same_page_fragment(href) {
                self.dom.borrow_mut().history.push(fragment.to_owned());
                self.navigate_to_hash(fragment);
            }
        }
        self.dispatch(controller);
        disposition
    }

    // ---- event loop ----

    /// Deliver queued events until the queue is empty.
    ///
    /// Returns the number of events delivered.
    pub fn dispatch(&self, controller: &mut SiteController<Self>) -> usize {
        let mut delivered = 0;
        loop {
            // The borrow must end before the controller writes back.
            let next = self.dom.borrow_mut().queue.pop_front();
            let Some(event) = next else {
                return delivered;
            };
            controller.handle(event);
            delivered += 1;
        }
    }

    /// Let `dt` of host time pass: deliver queued events, fire due timers,
    /// then run one animation frame if any was requested.
    pub fn advance(&self, controller: &mut SiteController<Self>, dt: Duration) {
        self.dispatch(controller);
        {
            let mut dom = self.dom.borrow_mut();
            dom.now = dom.now.saturating_add(dt);
        }
        while let Some(id) = self.next_due_timer() {
            self.dom.borrow_mut().timers.remove(&id);
            controller.handle(HostEvent::Timer);
            self.dispatch(controller);
        }
        let frames = core::mem::take(&mut self.dom.borrow_mut().frames);
        for _ in frames {
            controller.handle(HostEvent::AnimationFrame);
        }
        self.dispatch(controller);
    }

    /// Move the clock forward without firing timers or frames.
    pub fn advance_clock(&self, dt: Duration) {
        let mut dom = self.dom.borrow_mut();
        dom.now = dom.now.saturating_add(dt);
    }

    /// Advance by one nominal frame.
    pub fn advance_frame(&self, controller: &mut SiteController<Self>) {
        self.advance(controller, FRAME);
    }

    /// Advance frame by frame until at least `total` has elapsed.
    pub fn run_for(&self, controller: &mut SiteController<Self>, total: Duration) {
        let end = self.now().saturating_add(total);
        while self.now() < end {
            let step = end.saturating_sub(self.now()).min(FRAME);
            self.advance(controller, step);
        }
    }

    fn next_due_timer(&self) -> Option<u64> {
        let dom = self.dom.borrow();
        dom.timers
            .iter()
            .filter(|(_, deadline)| **deadline <= dom.now)
            .min_by_key(|(id, deadline)| (**deadline, **id))
            .map(|(id, _)| *id)
    }

    // ---- inspection ----

    /// Every write recorded so far.
    #[must_use]
    pub fn writes(&self) -> Vec<DomWrite> {
        self.dom.borrow().writes.clone()
    }

    /// Drain the write log.
    pub fn take_writes(&self) -> Vec<DomWrite> {
        core::mem::take(&mut self.dom.borrow_mut().writes)
    }

    /// Fragments pushed onto session history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.dom.borrow().history.clone()
    }

    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.dom.borrow().listeners.len()
    }

    #[must_use]
    pub fn live_frames(&self) -> usize {
        self.dom.borrow().frames.len()
    }

    #[must_use]
    pub fn live_timers(&self) -> usize {
        self.dom.borrow().timers.len()
    }

    #[must_use]
    pub fn queued_events(&self) -> usize {
        self.dom.borrow().queue.len()
    }

    fn push_node(&self, node: Node) -> NodeId {
        let mut dom = self.dom.borrow_mut();
        dom.nodes.push(node);
        NodeId(dom.nodes.len() - 1)
    }
}

impl ScrollHost for HeadlessHost {
    type Element = NodeId;
    type Subscription = HeadlessSubscription;
    type FrameRequest = HeadlessFrame;
    type Timer = HeadlessTimer;

    fn now(&self) -> Duration {
        self.dom.borrow().now
    }

    fn window_scroll_y(&self) -> f64 {
        self.dom.borrow().window_scroll_y
    }

    fn set_window_scroll_y(&self, y: f64) {
        let mut dom = self.dom.borrow_mut();
        dom.writes.push(DomWrite::WindowScroll(y));
        if dom.window_scroll_y != y {
            dom.window_scroll_y = y;
            let listening = dom.listening(EventSource::WindowScroll);
            dom.enqueue_if(listening, HostEvent::WindowScroll);
        }
    }

    fn scroll_top(&self, element: &NodeId) -> f64 {
        self.dom.borrow().node(*element).map_or(0.0, |n| n.scroll_top)
    }

    fn set_scroll_top(&self, element: &NodeId, top: f64) {
        let mut dom = self.dom.borrow_mut();
        dom.writes.push(DomWrite::ScrollTop {
            element: *element,
            top,
        });
        if let Some(node) = dom.nodes.get_mut(element.0) {
            node.scroll_top = top;
        }
    }

    fn scroll_height(&self, element: &NodeId) -> f64 {
        self.dom.borrow().node(*element).map_or(0.0, |n| n.scroll_height)
    }

    fn offset_within(&self, element: &NodeId, container: &NodeId) -> Option<f64> {
        let dom = self.dom.borrow();
        if !dom.is_descendant(*element, *container) {
            return None;
        }
        let mut offset = 0.0;
        let mut cursor = Some(*element);
        while let Some(id) = cursor.filter(|id| id != container) {
            let node = dom.node(id)?;
            offset += node.offset_top;
            cursor = node.parent;
        }
        Some(offset)
    }

    fn is_connected(&self, element: &NodeId) -> bool {
        self.dom.borrow().node(*element).is_some_and(|n| n.connected)
    }

    fn find_in(&self, container: &NodeId, id: &str) -> Option<NodeId> {
        let dom = self.dom.borrow();
        dom.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i), node))
            .find(|(candidate, node)| {
                node.connected
                    && node.dom_id.as_deref() == Some(id)
                    && dom.is_descendant(*candidate, *container)
            })
            .map(|(candidate, _)| candidate)
    }

    fn body_height(&self) -> BodyHeight {
        self.dom.borrow().body_height.clone()
    }

    fn set_body_height(&self, height: BodyHeight) {
        let mut dom = self.dom.borrow_mut();
        dom.writes.push(DomWrite::BodyHeight(height.clone()));
        dom.body_height = height;
    }

    fn location_hash(&self) -> Option<String> {
        self.dom.borrow().hash.clone()
    }

    fn push_hash(&self, fragment: &str) {
        let mut dom = self.dom.borrow_mut();
        dom.writes.push(DomWrite::PushHash(fragment.to_owned()));
        dom.history.push(fragment.to_owned());
        dom.hash = Some(fragment.to_owned());
    }

    fn request_frame(&self) -> HeadlessFrame {
        let mut dom = self.dom.borrow_mut();
        let id = dom.handle();
        dom.frames.insert(id);
        HeadlessFrame {
            id,
            dom: Rc::clone(&self.dom),
        }
    }

    fn set_timeout(&self, delay: Duration) -> HeadlessTimer {
        let mut dom = self.dom.borrow_mut();
        let id = dom.handle();
        let deadline = dom.now.saturating_add(delay);
        dom.timers.insert(id, deadline);
        HeadlessTimer {
            id,
            dom: Rc::clone(&self.dom),
        }
    }

    fn subscribe(&self, source: EventSource, container: &NodeId) -> HeadlessSubscription {
        let mut dom = self.dom.borrow_mut();
        let id = dom.handle();
        dom.listeners.insert(id, (source, *container));
        HeadlessSubscription {
            id,
            dom: Rc::clone(&self.dom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_through_ancestors() {
        let host = HeadlessHost::new();
        let container = host.create_container(2000.0);
        let wrapper = host.create_element(container, None, 500.0);
        let heading = host.create_element(wrapper, Some("about"), 40.0);
        assert_eq!(host.offset_within(&heading, &container), Some(540.0));
        assert_eq!(host.offset_within(&container, &container), None);
        assert_eq!(host.find_in(&container, "about"), Some(heading));
    }

    #[test]
    fn removed_subtrees_disconnect() {
        let host = HeadlessHost::new();
        let container = host.create_container(1000.0);
        let section = host.create_element(container, Some("projects"), 100.0);
        let child = host.create_element(section, None, 10.0);
        host.remove_element(section);
        assert!(!host.is_connected(&section));
        assert!(!host.is_connected(&child));
        assert!(host.is_connected(&container));
        assert_eq!(host.find_in(&container, "projects"), None);
    }

    #[test]
    fn guards_release_on_drop() {
        let host = HeadlessHost::new();
        let container = host.create_container(0.0);
        let sub = host.subscribe(EventSource::WindowScroll, &container);
        let frame = host.request_frame();
        let timer = host.set_timeout(Duration::from_millis(10));
        assert_eq!(
            (host.live_subscriptions(), host.live_frames(), host.live_timers()),
            (1, 1, 1)
        );
        drop((sub, frame, timer));
        assert_eq!(
            (host.live_subscriptions(), host.live_frames(), host.live_timers()),
            (0, 0, 0)
        );
    }

    #[test]
    fn scroll_events_need_a_listener() {
        let host = HeadlessHost::new();
        let container = host.create_container(0.0);
        host.user_scroll(10.0);
        assert_eq!(host.queued_events(), 0);

        let _sub = host.subscribe(EventSource::WindowScroll, &container);
        host.user_scroll(20.0);
        host.user_scroll(20.0);
        assert_eq!(host.queued_events(), 1);
    }

    #[test]
    fn writes_are_recorded_in_order() {
        let host = HeadlessHost::new();
        let container = host.create_container(0.0);
        host.set_body_height(BodyHeight::Pixels(10.0));
        host.set_scroll_top(&container, 5.0);
        host.push_hash("about");
        assert_eq!(
            host.take_writes(),
            vec![
                DomWrite::BodyHeight(BodyHeight::Pixels(10.0)),
                DomWrite::ScrollTop {
                    element: container,
                    top: 5.0
                },
                DomWrite::PushHash("about".into()),
            ]
        );
        assert!(host.writes().is_empty());
        assert_eq!(host.location_hash().as_deref(), Some("about"));
    }
}

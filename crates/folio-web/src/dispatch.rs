#![forbid(unsafe_code)]

//! Re-entrancy-safe delivery of host callbacks to the controller.
//!
//! Browser callbacks and JS API calls all funnel into one
//! [`SiteController`]. JS never runs synchronously inside a controller call
//! in practice, but if a callback does arrive while the controller is
//! borrowed, it is parked in a backlog and replayed as soon as the current
//! call returns instead of panicking on a double borrow. Image settle
//! reports from the preloader share that backlog.

use core::cell::RefCell;
use std::collections::VecDeque;

use folio_core::readiness::LoadOutcome;
use folio_core::{Disposition, HostEvent, ScrollHost, SiteController};
use tracing::trace;

#[derive(Debug)]
enum Deferred {
    Event(HostEvent),
    AssetSettled { url: String, outcome: LoadOutcome },
}

pub struct Dispatcher<H: ScrollHost> {
    controller: RefCell<SiteController<H>>,
    backlog: RefCell<VecDeque<Deferred>>,
}

impl<H: ScrollHost> Dispatcher<H> {
    pub fn new(controller: SiteController<H>) -> Self {
        Self {
            controller: RefCell::new(controller),
            backlog: RefCell::new(VecDeque::new()),
        }
    }

    /// Deliver one host event.
    ///
    /// A deferred event always reports [`Disposition::Default`]: its native
    /// event has already finished dispatching.
    pub fn deliver(&self, event: HostEvent) -> Disposition {
        let Ok(mut controller) = self.controller.try_borrow_mut() else {
            trace!(?event, "controller busy; deferring event");
            self.backlog.borrow_mut().push_back(Deferred::Event(event));
            return Disposition::Default;
        };
        let disposition = controller.handle(event);
        self.drain(&mut controller);
        disposition
    }

    /// Report a preloaded image as settled, deferring it if the controller
    /// is busy.
    pub fn settle_asset(&self, url: &str, outcome: LoadOutcome) {
        let Ok(mut controller) = self.controller.try_borrow_mut() else {
            trace!(url, ?outcome, "controller busy; deferring asset");
            self.backlog.borrow_mut().push_back(Deferred::AssetSettled {
                url: url.to_owned(),
                outcome,
            });
            return;
        };
        controller.asset_settled(url, outcome);
        self.drain(&mut controller);
    }

    /// Run `f` against the controller, then replay anything deferred meanwhile.
    ///
    /// Returns `None` if the controller is already borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&mut SiteController<H>) -> R) -> Option<R> {
        let mut controller = self.controller.try_borrow_mut().ok()?;
        let result = f(&mut controller);
        self.drain(&mut controller);
        Some(result)
    }

    /// Events and settle reports waiting for the controller.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.borrow().len()
    }

    fn drain(&self, controller: &mut SiteController<H>) {
        loop {
            let next = self.backlog.borrow_mut().pop_front();
            match next {
                Some(Deferred::Event(event)) => {
                    controller.handle(event);
                }
                Some(Deferred::AssetSettled { url, outcome }) => {
                    controller.asset_settled(&url, outcome);
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::headless::HeadlessHost;
    use folio_core::{Section, SiteConfig};
    use pretty_assertions::assert_eq;

    fn dispatcher() -> (HeadlessHost, Dispatcher<HeadlessHost>) {
        let host = HeadlessHost::new();
        let container = host.create_container(2000.0);
        let about = host.create_element(container, Some("about"), 600.0);
        let config = SiteConfig::default().with_modules(Vec::<String>::new());
        let mut controller = SiteController::new(host.clone(), &config, Vec::<String>::new());
        controller.register(Section::About, about);
        controller.set_container(Some(container));
        (host, Dispatcher::new(controller))
    }

    #[test]
    fn click_passes_disposition_through() {
        let (_host, dispatcher) = dispatcher();
        let disposition = dispatcher.deliver(HostEvent::AnchorClick {
            href: "#about".into(),
        });
        assert_eq!(disposition, Disposition::PreventDefault);
    }

    #[test]
    fn nested_delivery_is_deferred_then_replayed() {
        let (host, dispatcher) = dispatcher();
        let started = dispatcher.with(|controller| {
            let nested = dispatcher.deliver(HostEvent::AnchorClick {
                href: "#about".into(),
            });
            assert_eq!(nested, Disposition::Default);
            assert_eq!(dispatcher.backlog_len(), 1);
            controller.scroll_state().active_animation
        });
        assert_eq!(started, Some(None));
        assert_eq!(dispatcher.backlog_len(), 0);
        assert_eq!(host.history(), vec!["about".to_string()]);
        assert!(dispatcher.with(|c| c.scroll_state().active_animation.is_some()).unwrap());
    }

    #[test]
    fn asset_settled_while_busy_opens_gate_afterwards() {
        let host = HeadlessHost::new();
        let container = host.create_container(1000.0);
        let config = SiteConfig::default().with_modules(Vec::<String>::new());
        let mut controller = SiteController::new(host.clone(), &config, ["/a.webp"]);
        controller.set_container(Some(container));
        let dispatcher = Dispatcher::new(controller);

        let ready_inside = dispatcher.with(|controller| {
            dispatcher.settle_asset("/a.webp", LoadOutcome::Failed);
            assert_eq!(dispatcher.backlog_len(), 1);
            controller.is_ready()
        });
        assert_eq!(ready_inside, Some(false));
        assert_eq!(dispatcher.backlog_len(), 0);
        assert_eq!(dispatcher.with(|c| (c.is_ready(), c.is_attached())), Some((true, true)));
    }

    #[test]
    fn with_reports_busy() {
        let (_host, dispatcher) = dispatcher();
        let inner = dispatcher.with(|_| dispatcher.with(|_| ()));
        assert_eq!(inner, Some(None));
    }
}

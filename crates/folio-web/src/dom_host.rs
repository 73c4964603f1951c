#![forbid(unsafe_code)]

//! [`ScrollHost`] over the real browser DOM.
//!
//! Every listener, observer, animation frame and timeout is wrapped in a
//! guard that owns its `Closure` and unregisters it on drop. Callbacks emit
//! [`HostEvent`]s into a sink installed with [`DomHost::connect`]; until a
//! sink is connected they are dropped.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use folio_core::{BodyHeight, Disposition, EventSource, HostEvent, ScrollHost};
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, EventTarget, MouseEvent, MutationObserver, MutationObserverInit,
    Node, ResizeObserver, Window,
};

type Deliver = Box<dyn Fn(HostEvent) -> Disposition>;
type EventSink = Rc<RefCell<Option<Deliver>>>;

fn emit(sink: &EventSink, event: HostEvent) -> Disposition {
    let Ok(sink) = sink.try_borrow() else {
        return Disposition::Default;
    };
    sink.as_ref()
        .map_or(Disposition::Default, |deliver| deliver(event))
}

/// Browser page handle.
#[derive(Clone)]
pub struct DomHost {
    window: Window,
    document: Document,
    sink: EventSink,
}

impl DomHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self {
            window,
            document,
            sink: Rc::new(RefCell::new(None)),
        })
    }

    #[must_use]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Route every callback to `deliver`.
    pub fn connect(&self, deliver: impl Fn(HostEvent) -> Disposition + 'static) {
        if let Ok(mut sink) = self.sink.try_borrow_mut() {
            *sink = Some(Box::new(deliver));
        }
    }

    /// Stop routing callbacks. Guards still release on drop.
    pub fn disconnect(&self) {
        if let Ok(mut sink) = self.sink.try_borrow_mut() {
            sink.take();
        }
    }

    /// Viewport width in CSS pixels.
    #[must_use]
    pub fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or(0.0)
    }

    fn listen(
        &self,
        target: EventTarget,
        name: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> DomSubscription {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        if let Err(err) =
            target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
        {
            warn!(event = name, ?err, "addEventListener failed");
            return DomSubscription(None);
        }
        DomSubscription(Some(Registration::Listener {
            target,
            name,
            closure,
        }))
    }

    fn observe_mutations(&self, container: &Element) -> DomSubscription {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                emit(&sink, HostEvent::ContainerMutation);
            },
        );
        let observer = match MutationObserver::new(closure.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(?err, "MutationObserver unavailable");
                return DomSubscription(None);
            }
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(err) = observer.observe_with_options(container, &init) {
            warn!(?err, "MutationObserver.observe failed");
            return DomSubscription(None);
        }
        DomSubscription(Some(Registration::Mutation {
            observer,
            _closure: closure,
        }))
    }

    fn observe_resize(&self, container: &Element) -> DomSubscription {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::<dyn FnMut(js_sys::Array, ResizeObserver)>::new(
            move |_entries: js_sys::Array, _observer: ResizeObserver| {
                emit(&sink, HostEvent::ContainerResize);
            },
        );
        let observer = match ResizeObserver::new(closure.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(?err, "ResizeObserver unavailable");
                return DomSubscription(None);
            }
        };
        observer.observe(container);
        DomSubscription(Some(Registration::Resize {
            observer,
            _closure: closure,
        }))
    }
}

/// Strict descendant check.
fn contains(container: &Element, element: &Element) -> bool {
    let node: &Node = element;
    element != container && container.contains(Some(node))
}

/// `href` of the anchor a click landed in, if any.
fn anchor_href(event: &Event) -> Option<String> {
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let anchor = target.closest("a[href]").ok()??;
    anchor.get_attribute("href")
}

/// Plain primary-button click without modifiers.
fn is_plain_click(event: &Event) -> bool {
    event.dyn_ref::<MouseEvent>().is_none_or(|mouse| {
        mouse.button() == 0
            && !mouse.ctrl_key()
            && !mouse.meta_key()
            && !mouse.shift_key()
            && !mouse.alt_key()
    })
}

enum Registration {
    Listener {
        target: EventTarget,
        name: &'static str,
        closure: Closure<dyn FnMut(Event)>,
    },
    Mutation {
        observer: MutationObserver,
        _closure: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    },
    Resize {
        observer: ResizeObserver,
        _closure: Closure<dyn FnMut(js_sys::Array, ResizeObserver)>,
    },
}

/// Live listener or observer. `None` when registration failed.
pub struct DomSubscription(Option<Registration>);

impl Drop for DomSubscription {
    fn drop(&mut self) {
        match self.0.take() {
            Some(Registration::Listener {
                target,
                name,
                closure,
            }) => {
                let _ = target
                    .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            }
            Some(Registration::Mutation { observer, .. }) => observer.disconnect(),
            Some(Registration::Resize { observer, .. }) => observer.disconnect(),
            None => {}
        }
    }
}

/// Outstanding `requestAnimationFrame`.
pub struct DomFrame {
    window: Window,
    handle: Option<i32>,
    _closure: Closure<dyn FnMut(f64)>,
}

impl Drop for DomFrame {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.window.cancel_animation_frame(handle);
        }
    }
}

/// Armed `setTimeout`.
pub struct DomTimer {
    window: Window,
    handle: Option<i32>,
    _closure: Closure<dyn FnMut()>,
}

impl Drop for DomTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}

impl ScrollHost for DomHost {
    type Element = Element;
    type Subscription = DomSubscription;
    type FrameRequest = DomFrame;
    type Timer = DomTimer;

    fn now(&self) -> Duration {
        let ms = self.window.performance().map_or(0.0, |p| p.now());
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or_default()
    }

    fn window_scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn set_window_scroll_y(&self, y: f64) {
        let x = self.window.scroll_x().unwrap_or(0.0);
        self.window.scroll_to_with_x_and_y(x, y);
    }

    fn scroll_top(&self, element: &Element) -> f64 {
        f64::from(element.scroll_top())
    }

    fn set_scroll_top(&self, element: &Element, top: f64) {
        // Goes through the property so fractional offsets survive.
        let _ = js_sys::Reflect::set(
            element,
            &JsValue::from_str("scrollTop"),
            &JsValue::from_f64(top),
        );
    }

    fn scroll_height(&self, element: &Element) -> f64 {
        f64::from(element.scroll_height())
    }

    fn offset_within(&self, element: &Element, container: &Element) -> Option<f64> {
        if !contains(container, element) {
            return None;
        }
        let top = element.get_bounding_client_rect().top();
        let origin = container.get_bounding_client_rect().top();
        Some(top - origin + f64::from(container.scroll_top()))
    }

    fn is_connected(&self, element: &Element) -> bool {
        element.is_connected()
    }

    fn find_in(&self, container: &Element, id: &str) -> Option<Element> {
        self.document
            .get_element_by_id(id)
            .filter(|element| contains(container, element))
    }

    fn body_height(&self) -> BodyHeight {
        self.document.body().map_or(BodyHeight::Auto, |body| {
            let value = body.style().get_property_value("height").unwrap_or_default();
            BodyHeight::from_css(&value)
        })
    }

    fn set_body_height(&self, height: BodyHeight) {
        let Some(body) = self.document.body() else {
            return;
        };
        let style = body.style();
        let result = match height {
            BodyHeight::Auto => style.remove_property("height").map(drop),
            BodyHeight::Pixels(_) | BodyHeight::Css(_) => {
                style.set_property("height", &height.to_css())
            }
        };
        if let Err(err) = result {
            warn!(?err, "failed to set body height");
        }
    }

    fn location_hash(&self) -> Option<String> {
        let raw = self.window.location().hash().ok()?;
        let raw = raw.strip_prefix('#').unwrap_or(&raw);
        let decoded = js_sys::decode_uri_component(raw)
            .ok()
            .and_then(|s| s.as_string())
            .unwrap_or_else(|| raw.to_owned());
        Some(decoded).filter(|fragment| !fragment.is_empty())
    }

    fn push_hash(&self, fragment: &str) {
        let url = format!("#{fragment}");
        let pushed = self
            .window
            .history()
            .and_then(|history| history.push_state_with_url(&JsValue::NULL, "", Some(&url)));
        if let Err(err) = pushed {
            warn!(?err, fragment, "history.pushState failed");
        }
    }

    fn request_frame(&self) -> DomFrame {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
            emit(&sink, HostEvent::AnimationFrame);
        });
        let handle = self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(|err| warn!(?err, "requestAnimationFrame failed"))
            .ok();
        DomFrame {
            window: self.window.clone(),
            handle,
            _closure: closure,
        }
    }

    fn set_timeout(&self, delay: Duration) -> DomTimer {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::<dyn FnMut()>::new(move || {
            emit(&sink, HostEvent::Timer);
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis,
            )
            .map_err(|err| warn!(?err, "setTimeout failed"))
            .ok();
        DomTimer {
            window: self.window.clone(),
            handle,
            _closure: closure,
        }
    }

    fn subscribe(&self, source: EventSource, container: &Element) -> DomSubscription {
        match source {
            EventSource::WindowScroll => {
                let sink = Rc::clone(&self.sink);
                self.listen(self.window.clone().into(), "scroll", move |_event| {
                    emit(&sink, HostEvent::WindowScroll);
                })
            }
            EventSource::HashChange => {
                let sink = Rc::clone(&self.sink);
                self.listen(self.window.clone().into(), "hashchange", move |_event| {
                    emit(&sink, HostEvent::HashChange);
                })
            }
            EventSource::DocumentClick => {
                let sink = Rc::clone(&self.sink);
                self.listen(self.document.clone().into(), "click", move |event: Event| {
                    if event.default_prevented() || !is_plain_click(&event) {
                        return;
                    }
                    let Some(href) = anchor_href(&event) else {
                        return;
                    };
                    if emit(&sink, HostEvent::AnchorClick { href }) == Disposition::PreventDefault
                    {
                        event.prevent_default();
                    }
                })
            }
            EventSource::ContainerMutation => self.observe_mutations(container),
            EventSource::ContainerResize => self.observe_resize(container),
        }
    }
}

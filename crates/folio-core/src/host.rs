#![forbid(unsafe_code)]

//! The seam between the deterministic core and its embedding environment.
//!
//! The core never touches a DOM directly. Everything it reads or writes goes
//! through a [`ScrollHost`]: the browser adapter in `folio-web`, or the
//! in-memory [`HeadlessHost`](crate::headless::HeadlessHost) used by tests.
//!
//! Three host resources are RAII guards. Dropping a [`ScrollHost::Subscription`]
//! removes the listener or disconnects the observer, dropping a
//! [`ScrollHost::FrameRequest`] cancels the animation frame, and dropping a
//! [`ScrollHost::Timer`] clears the timeout. Release is therefore enforced by
//! ownership rather than by remembering to call a matching "remove".

use core::fmt;
use core::time::Duration;

/// Inline height applied to the document body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyHeight {
    /// No inline height; the body sizes naturally.
    #[default]
    Auto,
    /// Fixed height in CSS pixels.
    Pixels(f64),
    /// Any other inline value (`100vh`, `calc(...)`), kept verbatim.
    Css(String),
}

impl BodyHeight {
    /// CSS value for `style.height` (empty string clears the inline style).
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Auto => String::new(),
            Self::Pixels(px) => format!("{px}px"),
            Self::Css(raw) => raw.clone(),
        }
    }

    /// Parse an inline `style.height` value. Pixel lengths become
    /// [`BodyHeight::Pixels`], an empty value [`BodyHeight::Auto`], and
    /// anything else is kept as written.
    #[must_use]
    pub fn from_css(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::Auto;
        }
        value
            .strip_suffix("px")
            .and_then(|px| px.trim().parse::<f64>().ok())
            .filter(|px| px.is_finite())
            .map_or_else(|| Self::Css(value.to_owned()), Self::Pixels)
    }
}

/// Event streams the bridge subscribes to while attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// `scroll` on the window.
    WindowScroll,
    /// Delegated `click` on the document.
    DocumentClick,
    /// `hashchange` on the window (back/forward).
    HashChange,
    /// Child list mutations anywhere under the container.
    ContainerMutation,
    /// Size changes of the container.
    ContainerResize,
}

impl EventSource {
    /// Every source, in subscription order.
    pub const ALL: [EventSource; 5] = [
        EventSource::WindowScroll,
        EventSource::DocumentClick,
        EventSource::HashChange,
        EventSource::ContainerMutation,
        EventSource::ContainerResize,
    ];
}

/// Callbacks a host delivers to the
/// [`SiteController`](crate::controller::SiteController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    WindowScroll,
    /// A previously requested animation frame fired.
    AnimationFrame,
    /// A previously armed timer fired.
    Timer,
    /// A click landed on an anchor carrying this raw `href` attribute.
    AnchorClick { href: String },
    HashChange,
    ContainerMutation,
    ContainerResize,
}

/// What the host should do with the native event after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Let the browser run its default action.
    #[default]
    Default,
    /// Call `preventDefault()`; the core handled the event.
    PreventDefault,
}

/// Embedding environment for the scroll core.
///
/// Handles are cheap to clone (the browser host wraps reference-counted JS
/// objects). Methods take `&self`: the DOM is shared, interior-mutable state.
pub trait ScrollHost: Clone {
    /// Opaque element handle.
    type Element: Clone + PartialEq + fmt::Debug;
    /// Live listener/observer. Dropping it unsubscribes.
    type Subscription;
    /// Outstanding animation-frame request. Dropping it cancels the frame.
    type FrameRequest;
    /// Armed timeout. Dropping it clears the timeout.
    type Timer;

    /// Monotonic host time (e.g. `performance.now()`).
    fn now(&self) -> Duration;

    /// Outer document scroll offset (`window.scrollY`).
    fn window_scroll_y(&self) -> f64;

    /// Move the outer document scroll offset.
    fn set_window_scroll_y(&self, y: f64);

    /// Internal scroll offset of `element`.
    fn scroll_top(&self, element: &Self::Element) -> f64;

    /// Write the internal scroll offset of `element`.
    fn set_scroll_top(&self, element: &Self::Element, top: f64);

    /// Full content height of `element`.
    fn scroll_height(&self, element: &Self::Element) -> f64;

    /// Offset of `element` inside `container`'s scrolled content, or `None`
    /// if `element` is not a descendant of `container`.
    fn offset_within(&self, element: &Self::Element, container: &Self::Element) -> Option<f64>;

    /// Whether `element` is still attached to the document.
    fn is_connected(&self, element: &Self::Element) -> bool;

    /// Find an element with DOM id `id` inside `container`.
    fn find_in(&self, container: &Self::Element, id: &str) -> Option<Self::Element>;

    /// Current inline body height.
    fn body_height(&self) -> BodyHeight;

    /// Set the inline body height.
    fn set_body_height(&self, height: BodyHeight);

    /// Current URL fragment without the `#`, or `None` when absent or empty.
    fn location_hash(&self) -> Option<String>;

    /// Push `#fragment` onto session history without navigating.
    fn push_hash(&self, fragment: &str);

    /// Request one animation frame; the host later delivers
    /// [`HostEvent::AnimationFrame`].
    fn request_frame(&self) -> Self::FrameRequest;

    /// Arm a one-shot timer; the host later delivers [`HostEvent::Timer`].
    fn set_timeout(&self, delay: Duration) -> Self::Timer;

    /// Start delivering `source` events. `container` scopes the observer
    /// sources and is ignored by window/document sources.
    fn subscribe(&self, source: EventSource, container: &Self::Element) -> Self::Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_height_css_roundtrip() {
        assert_eq!(BodyHeight::Pixels(2300.0).to_css(), "2300px");
        assert_eq!(BodyHeight::Auto.to_css(), "");
        assert_eq!(BodyHeight::from_css("2300px"), BodyHeight::Pixels(2300.0));
        assert_eq!(BodyHeight::from_css(" 12.5px "), BodyHeight::Pixels(12.5));
    }

    #[test]
    fn non_pixel_heights_are_kept_verbatim() {
        assert_eq!(BodyHeight::from_css(""), BodyHeight::Auto);
        assert_eq!(BodyHeight::from_css("  "), BodyHeight::Auto);
        assert_eq!(BodyHeight::from_css("100vh"), BodyHeight::Css("100vh".into()));
        assert_eq!(
            BodyHeight::from_css(" calc(100% - 2px) ").to_css(),
            "calc(100% - 2px)"
        );
        assert_eq!(BodyHeight::from_css("NaNpx"), BodyHeight::Css("NaNpx".into()));
    }
}

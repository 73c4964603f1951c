#![forbid(unsafe_code)]

//! `folio-core`: scroll synchronization and section navigation for a
//! single-page portfolio.
//!
//! Design goals:
//! - **Host-driven**: the embedding environment delivers events and performs
//!   DOM writes through the [`host::ScrollHost`] trait.
//! - **Deterministic time**: every timestamp comes from the host clock.
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! The browser adapter lives in `folio-web`; [`headless::HeadlessHost`] runs
//! the same controller against an in-memory page.

pub mod animation;
pub mod assets;
pub mod bridge;
pub mod config;
pub mod contact;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod headless;
pub mod host;
pub mod navigator;
pub mod readiness;
pub mod registry;
pub mod section;

pub use bridge::{AttachChange, BridgeConfig, LayoutChange, Relayout, ScrollBridge};
pub use config::SiteConfig;
pub use controller::{ScrollState, SiteController};
pub use error::FolioError;
pub use host::{BodyHeight, Disposition, EventSource, HostEvent, ScrollHost};
pub use navigator::{AnchorNavigator, ScrollTask};
pub use readiness::{LoadOutcome, ReadinessGate};
pub use registry::SectionRegistry;
pub use section::Section;

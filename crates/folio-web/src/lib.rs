#![forbid(unsafe_code)]

//! WASM frontend for folio.
//!
//! Binds the scroll bridge, anchor navigation, readiness gate and contact
//! form from `folio-core` to the browser:
//! - a DOM-backed [`folio_core::ScrollHost`],
//! - image preloading that feeds the readiness gate,
//! - the `fetch` transport for the contact relay,
//! - a `tracing` layer writing to the browser console.
//!
//! Everything is exported to JS through one `FolioWeb` handle.

pub mod console_layer;
pub mod dispatch;

#[cfg(target_arch = "wasm32")]
mod dom_host;
#[cfg(target_arch = "wasm32")]
pub mod preload;
#[cfg(target_arch = "wasm32")]
mod relay;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::FolioWeb;

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct FolioWeb;

#[cfg(not(target_arch = "wasm32"))]
impl FolioWeb {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

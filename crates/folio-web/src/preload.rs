#![forbid(unsafe_code)]

//! Image preloading as futures.
//!
//! Each image resolves once its `load` or `error` event fires; a broken
//! image settles just like a good one.

use core::cell::RefCell;
use std::rc::Rc;

use folio_core::readiness::{LoadOutcome, settle_all};
use futures::channel::oneshot;
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::HtmlImageElement;

/// Load `url` into a detached `<img>` and wait for it to settle.
pub async fn load_image(url: &str) -> LoadOutcome {
    let Ok(image) = HtmlImageElement::new() else {
        return LoadOutcome::Failed;
    };
    let (tx, rx) = oneshot::channel::<LoadOutcome>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let settle = |outcome: LoadOutcome| {
        let tx = Rc::clone(&tx);
        Closure::<dyn FnMut()>::new(move || {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(outcome);
            }
        })
    };
    let on_load = settle(LoadOutcome::Loaded);
    let on_error = settle(LoadOutcome::Failed);
    image.set_onload(Some(on_load.as_ref().unchecked_ref()));
    image.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    image.set_src(url);

    let outcome = rx.await.unwrap_or(LoadOutcome::Failed);
    image.set_onload(None);
    image.set_onerror(None);
    debug!(url, ?outcome, "image settled");
    outcome
}

/// Preload every URL concurrently, reporting each as it settles.
///
/// Resolves once all of them have settled; returns how many there were.
pub async fn preload<F>(urls: &[String], on_settled: F) -> usize
where
    F: Fn(&str, LoadOutcome),
{
    let on_settled = &on_settled;
    settle_all(urls.iter().map(|url| async move {
        let outcome = load_image(url).await;
        on_settled(url.as_str(), outcome);
    }))
    .await
}

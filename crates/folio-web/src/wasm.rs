#![forbid(unsafe_code)]

use core::cell::RefCell;
use std::rc::Rc;

use folio_core::assets::preload_urls;
use folio_core::contact::{ContactForm, Field, NoticeLevel, RelayOutcome, RelayRequest, RelayResponse};
use folio_core::{Disposition, FolioError, Section, SiteConfig, SiteController};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::Element;

use crate::console_layer::{BrowserConsole, ConsoleLayer};
use crate::dispatch::Dispatcher;
use crate::dom_host::DomHost;
use crate::{preload, relay};

fn js_error(err: impl core::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json(value: &impl Serialize) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|err| js_error(FolioError::from(err)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateView {
    ready: bool,
    attached: bool,
    inner_scroll_top: f64,
    document_height: Option<f64>,
    active_animation: Option<u64>,
    pending_hash_target: Option<String>,
}

#[derive(Serialize)]
struct NoticeView<'a> {
    id: u64,
    level: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct FieldErrorView<'a> {
    field: &'static str,
    message: &'a str,
}

/// Page-level handle: scroll sync, section navigation, readiness and the
/// contact form.
///
/// Methods taking a section accept its name or DOM id (`"contact"`, `"tes"`).
#[wasm_bindgen]
pub struct FolioWeb {
    host: DomHost,
    dispatcher: Rc<Dispatcher<DomHost>>,
    form: Rc<RefCell<ContactForm>>,
    relay_endpoint: String,
    preload: Vec<String>,
}

#[wasm_bindgen]
impl FolioWeb {
    /// Create the handle from an optional JSON options object.
    #[wasm_bindgen(constructor)]
    pub fn new(options: Option<String>) -> Result<FolioWeb, JsValue> {
        let config = match options.as_deref() {
            Some(json) => SiteConfig::from_json(json).map_err(js_error)?,
            None => SiteConfig::default(),
        };
        let host = DomHost::new()?;
        let preload = preload_urls(&config.preload_images, host.viewport_width());
        let controller = SiteController::new(host.clone(), &config, preload.iter().cloned());
        let dispatcher = Rc::new(Dispatcher::new(controller));

        let weak = Rc::downgrade(&dispatcher);
        host.connect(move |event| {
            weak.upgrade()
                .map_or(Disposition::Default, |dispatcher| dispatcher.deliver(event))
        });
        info!(images = preload.len(), "folio initialized");

        Ok(Self {
            host,
            dispatcher,
            form: Rc::new(RefCell::new(ContactForm::new())),
            relay_endpoint: config.relay_endpoint,
            preload,
        })
    }

    /// Install a console logger at `level` (default `info`).
    ///
    /// Returns false if a global subscriber was already set.
    #[wasm_bindgen(js_name = initLogging)]
    pub fn init_logging(level: Option<String>) -> bool {
        let filter = level
            .as_deref()
            .and_then(|l| l.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::INFO);
        let subscriber = tracing_subscriber::registry()
            .with(ConsoleLayer::new(BrowserConsole).with_filter(filter));
        tracing::subscriber::set_global_default(subscriber).is_ok()
    }

    // ---- readiness ----

    /// Preload the configured images. Resolves with their count once every
    /// one has loaded or failed.
    #[wasm_bindgen(js_name = startPreload)]
    pub fn start_preload(&self) -> js_sys::Promise {
        let dispatcher = Rc::downgrade(&self.dispatcher);
        let urls = self.preload.clone();
        future_to_promise(async move {
            let count = preload::preload(&urls, |url, outcome| match dispatcher.upgrade() {
                Some(dispatcher) => dispatcher.settle_asset(url, outcome),
                None => warn!(url, "image settled after the page handle was dropped"),
            })
            .await;
            Ok(JsValue::from(u32::try_from(count).unwrap_or(u32::MAX)))
        })
    }

    /// Image URLs chosen for this viewport.
    #[wasm_bindgen(js_name = preloadUrls)]
    pub fn preload_urls(&self) -> Vec<String> {
        self.preload.clone()
    }

    /// Report a lazily loaded module as mounted.
    #[wasm_bindgen(js_name = moduleLoaded)]
    pub fn module_loaded(&self, name: &str) -> Result<bool, JsValue> {
        self.control(|c| c.module_loaded(name))
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> Result<bool, JsValue> {
        self.control(|c| c.is_ready())
    }

    // ---- scrolling ----

    /// Set or clear (`null`) the scroll container.
    #[wasm_bindgen(js_name = setContainer)]
    pub fn set_container(&self, container: Option<Element>) -> Result<(), JsValue> {
        self.control(|c| c.set_container(container))
    }

    pub fn register(&self, section: &str, element: Element) -> Result<(), JsValue> {
        let section = parse_section(section)?;
        self.control(|c| {
            c.register(section, element);
        })
    }

    pub fn unregister(&self, section: &str) -> Result<bool, JsValue> {
        let section = parse_section(section)?;
        self.control(|c| c.unregister(section).is_some())
    }

    /// Smooth-scroll to a section. Resolves false if it is not mounted.
    #[wasm_bindgen(js_name = scrollTo)]
    pub fn scroll_to(&self, section: &str) -> Result<bool, JsValue> {
        let section = parse_section(section)?;
        self.control(|c| c.scroll_to(section).is_some())
    }

    /// Scroll to a fragment, deferring it until its target mounts.
    #[wasm_bindgen(js_name = scrollToHash)]
    pub fn scroll_to_hash(&self, fragment: &str) -> Result<bool, JsValue> {
        self.control(|c| c.scroll_to_hash(fragment).is_some())
    }

    #[wasm_bindgen(js_name = cancelScroll)]
    pub fn cancel_scroll(&self) -> Result<bool, JsValue> {
        self.control(|c| c.cancel_scroll().is_some())
    }

    /// Current scroll state as JSON.
    #[wasm_bindgen(js_name = scrollState)]
    pub fn scroll_state(&self) -> Result<String, JsValue> {
        let view = self.control(|c| {
            let state = c.scroll_state();
            StateView {
                ready: c.is_ready(),
                attached: c.is_attached(),
                inner_scroll_top: state.inner_scroll_top,
                document_height: state.document_height,
                active_animation: state.active_animation.map(|t| t.id()),
                pending_hash_target: state.pending_hash_target,
            }
        })?;
        to_json(&view)
    }

    // ---- contact form ----

    #[wasm_bindgen(js_name = setField)]
    pub fn set_field(&self, field: &str, value: String) -> Result<(), JsValue> {
        let field = Field::from_name(field)
            .ok_or_else(|| JsValue::from_str(&format!("unknown field: {field}")))?;
        self.form_mut()?.set_field(field, value);
        Ok(())
    }

    /// Validation errors from the last submit, as JSON.
    #[wasm_bindgen(js_name = fieldErrors)]
    pub fn field_errors(&self) -> Result<String, JsValue> {
        let form = self.form.try_borrow().map_err(js_error)?;
        let view: Vec<_> = form
            .field_errors()
            .iter()
            .map(|e| FieldErrorView {
                field: e.field.name(),
                message: &e.message,
            })
            .collect();
        to_json(&view)
    }

    #[wasm_bindgen(js_name = isSubmitting)]
    pub fn is_submitting(&self) -> bool {
        self.form.try_borrow().is_ok_and(|f| f.is_submitting())
    }

    #[wasm_bindgen(js_name = needsVerification)]
    pub fn needs_verification(&self) -> bool {
        self.form.try_borrow().is_ok_and(|f| f.needs_verification())
    }

    /// Submit with a score-based CAPTCHA token.
    ///
    /// Resolves with `"sent"`, `"verify"`, `"failed"`, or `"invalid"` when
    /// validation (or an in-flight request) blocked the submit.
    pub fn submit(&self, token: &str) -> Result<js_sys::Promise, JsValue> {
        let request = self.form_mut()?.submit(token);
        Ok(self.send(request))
    }

    /// Resubmit with an interactive challenge token.
    pub fn verify(&self, token: &str) -> Result<js_sys::Promise, JsValue> {
        let request = self.form_mut()?.verify(token);
        Ok(self.send(request))
    }

    /// Toasts, as JSON.
    pub fn notices(&self) -> Result<String, JsValue> {
        let form = self.form.try_borrow().map_err(js_error)?;
        let view: Vec<_> = form
            .notices()
            .iter()
            .map(|n| NoticeView {
                id: n.id,
                level: match n.level {
                    NoticeLevel::Success => "success",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Error => "error",
                },
                text: &n.text,
            })
            .collect();
        to_json(&view)
    }

    pub fn dismiss(&self, id: u32) -> Result<bool, JsValue> {
        Ok(self.form_mut()?.dismiss(u64::from(id)))
    }

    /// Detach from the page: restore the body, drop every listener.
    pub fn destroy(&self) {
        self.host.disconnect();
        if self.dispatcher.with(|c| c.detach()).is_none() {
            warn!("destroy called while busy");
        }
    }
}

impl FolioWeb {
    fn control<R>(&self, f: impl FnOnce(&mut SiteController<DomHost>) -> R) -> Result<R, JsValue> {
        self.dispatcher
            .with(f)
            .ok_or_else(|| JsValue::from_str("folio controller is busy"))
    }

    fn form_mut(&self) -> Result<core::cell::RefMut<'_, ContactForm>, JsValue> {
        self.form.try_borrow_mut().map_err(js_error)
    }

    fn send(&self, request: Option<RelayRequest>) -> js_sys::Promise {
        let form = Rc::clone(&self.form);
        let endpoint = self.relay_endpoint.clone();
        future_to_promise(async move {
            let Some(request) = request else {
                return Ok(JsValue::from_str("invalid"));
            };
            let version = request.version();
            let outcome = match relay::post(&endpoint, &request).await {
                Ok(body) => match RelayResponse::parse(&body) {
                    Ok(response) => Some(response.outcome(version)),
                    Err(err) => {
                        warn!(%err, "relay answered with malformed body");
                        None
                    }
                },
                Err(err) => {
                    warn!(error = ?err, "relay request failed");
                    None
                }
            };
            let label = match &outcome {
                Some(RelayOutcome::Sent { .. }) => "sent",
                Some(RelayOutcome::NeedsVerification) => "verify",
                Some(RelayOutcome::Failed { .. }) | None => "failed",
            };
            let mut form = form.try_borrow_mut().map_err(js_error)?;
            match outcome {
                Some(outcome) => form.complete(outcome),
                None => form.transport_failed(None),
            }
            Ok(JsValue::from_str(label))
        })
    }
}

fn parse_section(name: &str) -> Result<Section, JsValue> {
    name.parse::<Section>().map_err(js_error)
}

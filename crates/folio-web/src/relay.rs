#![forbid(unsafe_code)]

//! `fetch` transport for the contact relay.

use folio_core::contact::RelayRequest;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

/// POST `request` as JSON to `endpoint` and return the response body.
///
/// Non-2xx responses still yield their body: the relay reports failures in
/// the JSON envelope.
pub async fn post(endpoint: &str, request: &RelayRequest) -> Result<String, JsValue> {
    let body = request
        .to_json()
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&JsValue::from_str(&body));
    let req = Request::new_with_str_and_init(endpoint, &init)?;
    req.headers().set("Content-Type", "application/json")?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let response: Response = JsFuture::from(window.fetch_with_request(&req))
        .await?
        .dyn_into()?;
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

//! Conversion of JavaScript exceptions into bridge errors.

use bridge_traits::error::BridgeError;
use wasm_bindgen::{JsCast, JsValue};

/// Describe a thrown JavaScript value as an [`BridgeError::OperationFailed`].
///
/// `context` names the browser call that threw, e.g. `"localStorage.setItem"`.
pub fn js_error(context: &str, err: JsValue) -> BridgeError {
    BridgeError::OperationFailed(format!("{context}: {}", js_message(&err)))
}

pub(crate) fn js_message(err: &JsValue) -> String {
    if let Some(message) = err.as_string() {
        message
    } else if let Some(js_err) = err.dyn_ref::<js_sys::Error>() {
        js_err.message().into()
    } else {
        format!("{err:?}")
    }
}

pub(crate) fn window() -> Result<web_sys::Window, BridgeError> {
    web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".to_string()))
}

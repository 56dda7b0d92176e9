//! WebAssembly implementation of the `HttpClient` bridge trait.
//!
//! Requests go through the browser's `fetch` API. Query parameters are
//! encoded into the URL, and a request timeout aborts the fetch through an
//! `AbortController`. There is no automatic retry; callers that pass a
//! [`RetryPolicy`](bridge_traits::RetryPolicy) get a single attempt.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use bytes::Bytes;
use futures::{
    future::{select, Either},
    pin_mut, FutureExt,
};
use gloo_timers::future::TimeoutFuture;
use js_sys::{try_iter, Array, Uint8Array};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AbortController, AbortSignal, Headers, Request, RequestInit, RequestMode, Response, Window,
};

use crate::error::{js_error, js_message, window};

/// HTTP client backed by the browser's `fetch` API.
pub struct WasmHttpClient {
    window: Window,
}

impl WasmHttpClient {
    /// Create a client bound to the current browser window.
    pub fn new() -> BridgeResult<Self> {
        Ok(Self { window: window()? })
    }

    fn build_request(
        &self,
        request: &HttpRequest,
        signal: Option<&AbortSignal>,
    ) -> BridgeResult<Request> {
        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_mode(RequestMode::Cors);

        if let Some(signal) = signal {
            init.set_signal(Some(signal));
        }

        if let Some(body) = &request.body {
            init.set_body(&JsValue::from(Uint8Array::from(body.as_ref())));
        }

        let headers = Headers::new().map_err(|err| js_error("create headers", err))?;
        for (key, value) in &request.headers {
            headers
                .set(key, value)
                .map_err(|err| js_error("set header", err))?;
        }
        init.set_headers(&headers);

        let url = request.url_with_query()?;
        Request::new_with_str_and_init(&url, &init).map_err(|err| js_error("build request", err))
    }

    async fn fetch_with_timeout(
        &self,
        request: &Request,
        controller: Option<AbortController>,
        timeout: Option<Duration>,
    ) -> BridgeResult<Response> {
        let fetch = JsFuture::from(self.window.fetch_with_request(request));

        let result = match (timeout, controller) {
            (Some(timeout), Some(controller)) => {
                let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
                let timer = TimeoutFuture::new(timeout_ms).map(|_| ());
                pin_mut!(timer);
                pin_mut!(fetch);

                match select(fetch, timer).await {
                    Either::Left((response, _)) => response,
                    Either::Right((_, pending_fetch)) => {
                        controller.abort();
                        // Settle the aborted fetch so the browser releases it.
                        let _ = pending_fetch.await;
                        warn!(timeout_ms, "fetch aborted after timeout");
                        return Err(BridgeError::Timeout(timeout));
                    }
                }
            }
            _ => fetch.await,
        };

        // fetch rejects only on network failure; HTTP errors resolve.
        let value = result
            .map_err(|err| BridgeError::Connection(format!("fetch: {}", js_message(&err))))?;
        value
            .dyn_into::<Response>()
            .map_err(|_| BridgeError::OperationFailed("fetch returned non-Response".into()))
    }

    async fn read_body(response: &Response) -> BridgeResult<Bytes> {
        let promise = response
            .array_buffer()
            .map_err(|err| js_error("response.arrayBuffer", err))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|err| js_error("response body", err))?;
        let array = Uint8Array::new(&buffer);
        let mut bytes = vec![0u8; array.length() as usize];
        array.copy_to(&mut bytes);
        Ok(Bytes::from(bytes))
    }

    fn collect_headers(response: &Response) -> BridgeResult<HashMap<String, String>> {
        let iterator = try_iter(&JsValue::from(response.headers()))
            .map_err(|err| js_error("iterate headers", err))?
            .ok_or_else(|| BridgeError::OperationFailed("Headers iterator unavailable".into()))?;

        let mut map = HashMap::new();
        for entry in iterator {
            let entry = entry.map_err(|err| js_error("header iteration", err))?;
            let pair = Array::from(&entry);
            if let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                map.insert(key, value);
            }
        }

        Ok(map)
    }
}

#[async_trait(?Send)]
impl HttpClient for WasmHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let controller = match request.timeout {
            Some(_) => Some(
                AbortController::new().map_err(|err| js_error("create abort controller", err))?,
            ),
            None => None,
        };

        let signal = controller.as_ref().map(|c| c.signal());
        let fetch_request = self.build_request(&request, signal.as_ref())?;
        debug!(method = request.method.as_str(), url = %request.url, "fetch");

        let response = self
            .fetch_with_timeout(&fetch_request, controller, request.timeout)
            .await?;
        let body = Self::read_body(&response).await?;
        let headers = Self::collect_headers(&response)?;

        Ok(HttpResponse {
            status: response.status(),
            headers,
            body,
        })
    }
}

//! In-page upstream API caller
//!
//! Executes the autolink POST from inside the page's script context so the
//! request carries exactly the cookies and session tokens a real tab would
//! attach. This is the load-bearing reason the proxy drives a browser at
//! all; a plain HTTP client gets rejected by the upstream's protections.

use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::js_protocol::runtime::EvaluateParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::{BrowserError, BrowserResult};

/// Structured outcome of the in-page API call.
///
/// `status == 0` is a sentinel meaning the call never reached the network
/// layer (fetch threw inside the page), distinct from any real HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutolinkResult {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AutolinkResult {
    /// A result representing a failure before the upstream was reached.
    pub fn browser_failure(detail: impl Into<String>) -> Self {
        Self {
            status: 0,
            body: None,
            error: Some(detail.into()),
        }
    }
}

/// POST `{url: targetUrl}` to the autolink endpoint from page context.
///
/// A non-JSON success body is preserved as a raw string value with the real
/// HTTP status; it is never discarded.
pub async fn call_internal_api(
    page: &Page,
    api_url: &str,
    target_url: &str,
) -> BrowserResult<AutolinkResult> {
    let params = EvaluateParams::builder()
        .expression(build_fetch_expression(api_url, target_url))
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(BrowserError::EvaluationFailed)?;

    let evaluation = page
        .evaluate(params)
        .await
        .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;

    evaluation
        .into_value()
        .map_err(|e| BrowserError::EvaluationFailed(format!("unexpected call result shape: {e}")))
}

fn build_fetch_expression(api_url: &str, target_url: &str) -> String {
    // serde_json string encoding doubles as JS string escaping here.
    let api = serde_json::json!(api_url).to_string();
    let target = serde_json::json!(target_url).to_string();

    format!(
        r#"(async () => {{
    try {{
        const res = await fetch({api}, {{
            method: "POST",
            credentials: "include",
            headers: {{ "Content-Type": "application/json" }},
            body: JSON.stringify({{ url: {target} }}),
        }});
        const text = await res.text();
        let body;
        try {{ body = JSON.parse(text); }} catch (_e) {{ body = text; }}
        return {{ status: res.status, body: body }};
    }} catch (e) {{
        return {{ status: 0, error: String(e) }};
    }}
}})()"#
    )
}

//! Base request detection and `message` rewriting

use url::form_urlencoded;

use crate::http::Request;

const AURA_TOKEN_PARAM: &str = "aura.token";
const AURA_CONTEXT_PARAM: &str = "aura.context";
const MESSAGE_PARAM: &str = "message";

/// Whether a captured request can serve as a base request
///
/// Needs `aura.token` and `aura.context` in the form body and `/aura` in the
/// path.
pub fn is_aura_request(request: &Request) -> bool {
    let has_token = request.form_param(AURA_TOKEN_PARAM).is_some();
    let has_context = request.form_param(AURA_CONTEXT_PARAM).is_some();
    let is_aura_endpoint = request
        .path()
        .map(|p| p.contains("/aura"))
        .unwrap_or(false);

    has_token && has_context && is_aura_endpoint
}

/// Copy of `request` carrying `message` as its action message
///
/// GET rewrites the query string, POST the form body. Other methods use the
/// body when there is one and the query string otherwise.
pub fn rewrite_message_param(request: &Request, message: &str) -> Request {
    let mut rewritten = request.clone();
    let in_body = match request.method.as_str() {
        "GET" => false,
        "POST" => true,
        _ => request.body.as_deref().is_some_and(|b| !b.is_empty()),
    };

    if in_body {
        let body = request.body.as_deref().unwrap_or_default();
        rewritten.body = Some(replace_param(body, MESSAGE_PARAM, message));
    } else {
        rewritten.url = rewrite_query(&request.url, MESSAGE_PARAM, message);
    }
    rewritten
}

fn rewrite_query(url: &str, name: &str, value: &str) -> String {
    let (without_fragment, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let (base, query) = match without_fragment.find('?') {
        Some(i) => (&without_fragment[..i], &without_fragment[i + 1..]),
        None => (without_fragment, ""),
    };
    format!("{}?{}{}", base, replace_param(query, name, value), fragment)
}

/// Replace `name=...` in a `&`-separated parameter string, or append it
///
/// Other parameters are kept byte for byte.
fn replace_param(params: &str, name: &str, value: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    let prefix = format!("{}=", name);

    let mut found = false;
    let mut parts: Vec<String> = params
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with(&prefix) {
                found = true;
                format!("{}{}", prefix, encoded)
            } else {
                p.to_string()
            }
        })
        .collect();

    if !found {
        parts.push(format!("{}{}", prefix, encoded));
    }
    parts.join("&")
}

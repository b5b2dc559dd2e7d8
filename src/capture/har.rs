//! HAR (HTTP Archive) import

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::collections::HashMap;

use super::CapturedExchange;
use crate::error::CaptureError;
use crate::http::{Request, Response};

/// Parse a HAR document into captured exchanges, numbered from 1
pub fn parse(content: &str) -> Result<Vec<CapturedExchange>, CaptureError> {
    let har: HarFile = serde_json::from_str(content)?;

    Ok(har
        .log
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| convert_entry(i + 1, entry))
        .collect())
}

fn convert_entry(index: usize, entry: HarEntry) -> CapturedExchange {
    let mut request = Request::new(&entry.request.method, &entry.request.url).with_id(index);
    for header in entry.request.headers {
        // HTTP/2 pseudo-headers cannot be replayed
        if !header.name.starts_with(':') {
            request.headers.push((header.name, header.value));
        }
    }
    request.body = entry.request.post_data.and_then(|p| p.text);

    let (mime_type, response) = match entry.response {
        Some(r) => {
            let headers: HashMap<String, String> = r
                .headers
                .into_iter()
                .map(|h| (h.name.to_ascii_lowercase(), h.value))
                .collect();

            let body = match (r.content.text, r.content.encoding.as_deref()) {
                (Some(text), None) => text.into_bytes(),
                (Some(text), Some("base64")) => STANDARD.decode(text.trim()).unwrap_or_else(|e| {
                    tracing::debug!(entry = index, error = %e, "Undecodable response body");
                    Vec::new()
                }),
                (Some(_), Some(encoding)) => {
                    tracing::debug!(entry = index, encoding, "Skipping encoded response body");
                    Vec::new()
                }
                (None, _) => Vec::new(),
            };

            let response = Response {
                status: r.status,
                headers,
                body,
                ..Default::default()
            };
            (r.content.mime_type, Some(response))
        }
        None => (None, None),
    };

    CapturedExchange {
        index,
        request,
        response,
        mime_type,
    }
}

// HAR file structures

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    #[serde(default)]
    response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(rename = "postData")]
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    status: u16,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(default)]
    content: HarContent,
}

#[derive(Debug, Deserialize)]
struct HarHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct HarPostData {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HarContent {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    text: Option<String>,
    encoding: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let har = r#"{"log":{"entries":[
            {"request":{"method":"POST","url":"https://a.site.com/s/sfsites/aura?r=1",
                "headers":[{"name":":authority","value":"a.site.com"},{"name":"Cookie","value":"sid=1"}],
                "postData":{"mimeType":"application/x-www-form-urlencoded","text":"aura.token=t&aura.context=c"}},
             "response":{"status":200,"headers":[{"name":"Content-Type","value":"application/json"}],
                "content":{"mimeType":"application/json","text":"{\"actions\":[]}"}}},
            {"request":{"method":"GET","url":"https://a.site.com/app.js","headers":[]},
             "response":{"status":200,"headers":[],"content":{"mimeType":"application/javascript","text":"dmFyIGEgPSAxOw==","encoding":"base64"}}},
            {"request":{"method":"GET","url":"https://a.site.com/b.js"},
             "response":{"status":200,"content":{"text":"x","encoding":"gzip"}}}
        ]}}"#;

        let entries = parse(har).unwrap();
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.request.id, 1);
        assert_eq!(first.request.headers, vec![("Cookie".to_string(), "sid=1".to_string())]);
        assert_eq!(first.request.form_param("aura.token").as_deref(), Some("t"));
        assert_eq!(first.response.as_ref().unwrap().header("content-type"), Some("application/json"));

        let second = &entries[1];
        assert_eq!(second.mime_type.as_deref(), Some("application/javascript"));
        assert_eq!(second.response.as_ref().unwrap().body_text(), "var a = 1;");
        assert!(entries[2].response.as_ref().unwrap().body.is_empty());
    }

    #[test]
    fn test_invalid_har() {
        assert!(matches!(parse("not json"), Err(CaptureError::InvalidHar(_))));
        assert!(parse(r#"{"log":{}}"#).unwrap().is_empty());
    }
}

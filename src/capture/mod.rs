//! Captured traffic
//!
//! Imports HAR archives, picks the base request scans replay, and selects the
//! response bodies mining runs over.

mod har;

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;

use crate::app::CaptureConfig;
use crate::aura::is_aura_request;
use crate::error::CaptureError;
use crate::http::{Request, Response};
use crate::scope::Scope;

/// One captured request and, if recorded, its response
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    /// 1-based position in the capture
    pub index: usize,
    pub request: Request,
    pub response: Option<Response>,
    /// MIME type recorded with the response content
    pub mime_type: Option<String>,
}

impl CapturedExchange {
    /// Response content type, preferring the header over the recorded MIME type
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.content_type())
            .or(self.mime_type.as_deref())
    }
}

/// A loaded capture
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub exchanges: Vec<CapturedExchange>,
}

impl Capture {
    pub fn from_har_str(content: &str) -> Result<Self, CaptureError> {
        Ok(Self {
            exchanges: har::parse(content)?,
        })
    }

    pub async fn from_har_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read capture: {}", path.display()))?;
        let capture = Self::from_har_str(&content)?;
        tracing::info!(path = %path.display(), entries = capture.len(), "Loaded capture");
        Ok(capture)
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Requests that qualify as base requests
    pub fn base_requests(&self) -> impl Iterator<Item = &Request> + '_ {
        self.exchanges
            .iter()
            .map(|e| &e.request)
            .filter(|r| is_aura_request(r))
    }

    /// The base request at 1-based `entry`, or the first qualifying one
    ///
    /// An explicitly chosen entry is used even if it does not look like an
    /// Aura request.
    pub fn base_request(&self, entry: Option<usize>) -> Result<&Request, CaptureError> {
        match entry {
            Some(index) => self
                .exchanges
                .get(index.wrapping_sub(1))
                .map(|e| &e.request)
                .ok_or(CaptureError::EntryOutOfRange {
                    index,
                    len: self.exchanges.len(),
                }),
            None => self.base_requests().next().ok_or(CaptureError::NoBaseRequest),
        }
    }
}

/// A response body selected for mining
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedBody {
    pub index: usize,
    pub url: String,
    pub content_type: String,
    pub text: String,
}

impl fmt::Display for CapturedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.url)
    }
}

/// Selects captured bodies by content type, size and scope
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    content_types: Vec<String>,
    max_body_size: usize,
    scope: Option<Scope>,
}

impl CaptureFilter {
    pub fn new(config: &CaptureConfig, scope: Option<Scope>) -> Self {
        Self {
            content_types: config.content_types.iter().map(|t| t.to_ascii_lowercase()).collect(),
            max_body_size: config.max_body_size,
            scope,
        }
    }

    pub fn accepts(&self, exchange: &CapturedExchange) -> bool {
        let Some(response) = &exchange.response else {
            return false;
        };
        if response.body.is_empty() || response.body.len() > self.max_body_size {
            return false;
        }

        let content_type = exchange.content_type().unwrap_or_default().to_ascii_lowercase();
        if !self.content_types.iter().any(|t| content_type.contains(t.as_str())) {
            return false;
        }

        match &self.scope {
            Some(scope) => scope.is_in_scope(&exchange.request.url),
            None => true,
        }
    }

    /// Bodies of every accepted exchange, in capture order
    pub fn select(&self, capture: &Capture) -> Vec<CapturedBody> {
        let bodies: Vec<CapturedBody> = capture
            .exchanges
            .iter()
            .filter(|e| self.accepts(e))
            .filter_map(|e| {
                let response = e.response.as_ref()?;
                Some(CapturedBody {
                    index: e.index,
                    url: e.request.url.clone(),
                    content_type: e.content_type().unwrap_or_default().to_string(),
                    text: response.body_text(),
                })
            })
            .collect();

        tracing::debug!(selected = bodies.len(), total = capture.len(), "Selected captured bodies");
        bodies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(index: usize, url: &str, content_type: &str, body: &str) -> CapturedExchange {
        let mut response = Response::text(200, body);
        response.headers.insert("content-type".into(), content_type.into());
        CapturedExchange {
            index,
            request: Request::new("GET", url).with_id(index),
            response: Some(response),
            mime_type: None,
        }
    }

    fn capture() -> Capture {
        let aura = CapturedExchange {
            index: 3,
            request: Request::new("POST", "https://acme.site.com/s/sfsites/aura?r=1")
                .with_id(3)
                .body("aura.token=t&aura.context=c"),
            response: None,
            mime_type: None,
        };
        Capture {
            exchanges: vec![
                exchange(1, "https://acme.site.com/app.js", "application/javascript", "var a = 1;"),
                exchange(2, "https://cdn.other.com/lib.js", "text/javascript", "var b = 2;"),
                aura,
                exchange(4, "https://acme.site.com/logo.png", "image/png", "PNG"),
                exchange(5, "https://acme.site.com/empty.json", "application/json", ""),
            ],
        }
    }

    #[test]
    fn test_filter_by_content_type_and_body() {
        let filter = CaptureFilter::new(&CaptureConfig::default(), None);
        let selected = filter.select(&capture());
        let indexes: Vec<usize> = selected.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![1, 2]);
        assert_eq!(selected[0].to_string(), "#1 https://acme.site.com/app.js");
    }

    #[test]
    fn test_filter_by_scope() {
        let scope = Scope::from_rules(["*.site.com"], Vec::<String>::new()).unwrap();
        let filter = CaptureFilter::new(&CaptureConfig::default(), Some(scope));
        let selected = filter.select(&capture());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].text, "var a = 1;");
    }

    #[test]
    fn test_filter_size_limit() {
        let config = CaptureConfig {
            max_body_size: 5,
            ..Default::default()
        };
        assert!(CaptureFilter::new(&config, None).select(&capture()).is_empty());
    }

    #[test]
    fn test_base_request_selection() {
        let capture = capture();
        assert_eq!(capture.base_request(None).unwrap().id, 3);
        assert_eq!(capture.base_request(Some(1)).unwrap().id, 1);
        assert!(matches!(
            capture.base_request(Some(9)),
            Err(CaptureError::EntryOutOfRange { index: 9, len: 5 })
        ));
        assert!(matches!(
            capture.base_request(Some(0)),
            Err(CaptureError::EntryOutOfRange { index: 0, len: 5 })
        ));
        assert!(matches!(Capture::default().base_request(None), Err(CaptureError::NoBaseRequest)));
    }

    #[tokio::test]
    async fn test_from_har_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.har");
        std::fs::write(
            &path,
            r#"{"log":{"entries":[{"request":{"method":"GET","url":"https://a.com/"}}]}}"#,
        )
        .unwrap();

        let capture = Capture::from_har_file(&path).await.unwrap();
        assert_eq!(capture.len(), 1);
        assert!(capture.exchanges[0].response.is_none());
    }
}

//! Structure mining over captured text
//!
//! Pulls client-side routes and remote-procedure descriptors out of
//! JavaScript, JSON and HTML bodies. Extraction is lexical: route tables are
//! located by marker, cut out with the balanced extractor, then read with a
//! key regex plus a JSON parse of the same region.

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use crate::extract::BalancedExtractor;
use crate::pattern::MatchSpan;

/// Marker that opens a route table
pub const ROUTES_MARKER: &str = r#""routes"\s*:\s*\{"#;

/// Route keys inside a table, quoted and starting with `/`
const ROUTE_KEY_PATTERN: &str = r#""(/[^"\\]*)"\s*:"#;

/// Descriptor patterns and what they identify
const DESCRIPTOR_PATTERNS: &[(&str, FindingKind)] = &[
    (
        r"\b(?:serviceComponent|apex|aura)://[A-Za-z0-9_.]+/ACTION\$[A-Za-z0-9_]+",
        FindingKind::ActionDescriptor,
    ),
    (r"\bmarkup://[A-Za-z0-9_]+:[A-Za-z0-9_]+", FindingKind::ComponentDescriptor),
];

/// Longest match text kept as an entry name
const MAX_MATCH_NAME: usize = 200;

/// What a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Route,
    ActionDescriptor,
    ComponentDescriptor,
    Match,
}

impl FindingKind {
    pub fn name(&self) -> &'static str {
        match self {
            FindingKind::Route => "Route",
            FindingKind::ActionDescriptor => "Action descriptor",
            FindingKind::ComponentDescriptor => "Component descriptor",
            FindingKind::Match => "Match",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One mined value and where it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub value: String,
    /// Where the text came from, usually a URL
    pub source: String,
    /// 1-based line of the first occurrence
    pub line: usize,
}

impl Finding {
    /// Payload stored alongside the value in a result set
    pub fn payload(&self) -> String {
        format!("{} | Source: {} | Line: {}", self.kind, self.source, self.line)
    }
}

struct MinerPatterns {
    routes_marker: Regex,
    route_key: Regex,
    descriptors: Vec<(Regex, FindingKind)>,
}

fn patterns() -> &'static MinerPatterns {
    static PATTERNS: OnceLock<MinerPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MinerPatterns {
        routes_marker: Regex::new(ROUTES_MARKER).expect("routes marker"),
        route_key: Regex::new(ROUTE_KEY_PATTERN).expect("route key pattern"),
        descriptors: DESCRIPTOR_PATTERNS
            .iter()
            .map(|(p, kind)| (Regex::new(p).expect("descriptor pattern"), *kind))
            .collect(),
    })
}

fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Mines routes and descriptors from text
#[derive(Debug, Clone, Default)]
pub struct RouteMiner {
    extractor: BalancedExtractor,
}

impl RouteMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route paths declared by every route table in `text`, first occurrence wins
    pub fn mine_routes(&self, text: &str, source: &str) -> Vec<Finding> {
        let mut seen = HashSet::new();
        let mut findings = Vec::new();

        for region in self
            .extractor
            .find_marker_then_extract(text, &patterns().routes_marker)
        {
            let line = line_of(text, region.start);
            for path in route_keys(region.text) {
                if seen.insert(path.clone()) {
                    findings.push(Finding {
                        kind: FindingKind::Route,
                        value: path,
                        source: source.to_string(),
                        line,
                    });
                }
            }
        }

        findings
    }

    /// Action and component descriptors referenced in `text`
    pub fn mine_descriptors(&self, text: &str, source: &str) -> Vec<Finding> {
        let mut seen = HashSet::new();
        let mut findings = Vec::new();

        for (regex, kind) in &patterns().descriptors {
            for m in regex.find_iter(text) {
                if seen.insert(m.as_str()) {
                    findings.push(Finding {
                        kind: *kind,
                        value: m.as_str().to_string(),
                        source: source.to_string(),
                        line: line_of(text, m.start()),
                    });
                }
            }
        }

        findings
    }

    /// Routes followed by descriptors
    pub fn mine(&self, text: &str, source: &str) -> Vec<Finding> {
        let mut findings = self.mine_routes(text, source);
        findings.extend(self.mine_descriptors(text, source));
        tracing::debug!(source, found = findings.len(), "Mined text");
        findings
    }
}

/// Path keys of one extracted route table
///
/// A regex pass over the region collects quoted path keys in document order;
/// when the region is strict JSON its top-level keys are added too, which
/// catches keys with escaped characters. Duplicates are dropped.
pub fn route_keys(region: &str) -> Vec<String> {
    let mut keys: IndexSet<String> = patterns()
        .route_key
        .captures_iter(region)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(region) {
        keys.extend(map.into_iter().map(|(k, _)| k).filter(|k| k.starts_with('/')));
    }

    keys.into_iter().collect()
}

/// Findings for the spans of a pattern search, deduplicated by matched text
pub fn match_findings(text: &str, spans: &[MatchSpan], source: &str) -> Vec<Finding> {
    let mut seen = HashSet::new();
    spans
        .iter()
        .filter_map(|span| Some((span, span.slice(text)?)))
        .filter(|(_, matched)| !matched.is_empty() && seen.insert(*matched))
        .map(|(span, matched)| Finding {
            kind: FindingKind::Match,
            value: truncate_chars(matched, MAX_MATCH_NAME),
            source: source.to_string(),
            line: line_of(text, span.start),
        })
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_keys() {
        let miner = RouteMiner::new();
        let routes: Vec<String> = miner
            .mine_routes(r#"{"routes":{"/a":{},"/b":{}}}"#, "inline")
            .into_iter()
            .map(|f| f.value)
            .collect();
        assert_eq!(routes, vec!["/a", "/b"]);
    }

    #[test]
    fn test_routes_in_javascript() {
        let js = "window.cfg = {\n  \"routes\" : {\"/login\":{\"id\":\"x\"}, \"/s/{id}\":{}, home: {}},\n  other: 1\n};\n\"routes\":{\"/login\":{}}";
        let findings = RouteMiner::new().mine_routes(js, "app.js");

        let values: Vec<&str> = findings.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["/login", "/s/{id}"]);
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[0].source, "app.js");
    }

    #[test]
    fn test_unbalanced_table_is_skipped() {
        let findings = RouteMiner::new().mine_routes(r#"x = {"routes":{"/a":{}"#, "cut.js");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_route_keys_deduplicated() {
        assert_eq!(route_keys(r#"{"/b":{},"/a":{"/b":1}}"#), vec!["/b", "/a"]);
        assert_eq!(route_keys(r#"{"/q\"x":{}}"#), vec![r#"/q"x"#]);
    }

    #[test]
    fn test_descriptors() {
        let js = r#"
            $A.enqueueAction({descriptor:"serviceComponent://ui.force.components.controllers.hostConfig.HostConfigController/ACTION$getConfigData"});
            c.get("apex://AccountController/ACTION$listAccounts");
            c.get("apex://AccountController/ACTION$listAccounts");
            $A.createComponent("markup://c:invoiceList", {});
        "#;
        let findings = RouteMiner::new().mine_descriptors(js, "app.js");

        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].kind, FindingKind::ActionDescriptor);
        assert!(findings[0].value.ends_with("ACTION$getConfigData"));
        assert_eq!(findings[1].value, "apex://AccountController/ACTION$listAccounts");
        assert_eq!(findings[2].kind, FindingKind::ComponentDescriptor);
        assert_eq!(findings[2].value, "markup://c:invoiceList");
        assert_eq!(findings[2].line, 5);
    }

    #[test]
    fn test_match_findings() {
        let text = "id=1\nid=2\nid=1";
        let spans = vec![
            MatchSpan { start: 0, end: 4 },
            MatchSpan { start: 5, end: 9 },
            MatchSpan { start: 10, end: 14 },
        ];
        let findings = match_findings(text, &spans, "body");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[1].value, "id=2");
        assert_eq!(findings[1].line, 2);
        assert_eq!(findings[1].payload(), "Match | Source: body | Line: 2");
    }

    #[test]
    fn test_truncate_long_match() {
        let long = "x".repeat(250);
        let name = truncate_chars(&long, MAX_MATCH_NAME);
        assert_eq!(name.len(), MAX_MATCH_NAME + 3);
    }
}

//! Target scope
//!
//! Decides which captured URLs are eligible for mining. Rules are written on
//! the command line: `example.com`, `*.example.com`, a URL prefix such as
//! `https://acme.my.site.com/s/`, or `re:<regex>`. Regex rules pass through
//! the same [`PatternGuard`] as search patterns.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::ScopeError;
use crate::pattern::{PatternGuard, SearchPattern};

/// One scope rule
#[derive(Debug, Clone)]
pub enum ScopeRule {
    /// Host match, optionally including subdomains
    Host { host: String, subdomains: bool },
    /// Case-insensitive URL prefix
    UrlPrefix(String),
    /// Regex over the full URL
    Pattern(Regex),
}

impl ScopeRule {
    pub fn host(host: &str, subdomains: bool) -> Self {
        ScopeRule::Host {
            host: host.trim_end_matches('.').to_ascii_lowercase(),
            subdomains,
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            ScopeRule::Host { host, subdomains } => match url.host_str() {
                Some(h) => {
                    let h = h.to_ascii_lowercase();
                    h == *host || (*subdomains && h.ends_with(&format!(".{}", host)))
                }
                None => false,
            },
            ScopeRule::UrlPrefix(prefix) => url.as_str().to_lowercase().starts_with(prefix),
            ScopeRule::Pattern(re) => re.is_match(url.as_str()),
        }
    }
}

impl FromStr for ScopeRule {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ScopeError::Empty);
        }

        if let Some(pattern) = s.strip_prefix("re:") {
            let compiled = PatternGuard::default()
                .evaluate(&SearchPattern::new(pattern))
                .into_result()?;
            return Ok(ScopeRule::Pattern(compiled.regex().clone()));
        }

        if s.contains("://") {
            // Normalise through the URL parser so prefixes compare like parsed URLs
            let url = Url::parse(s).map_err(|e| ScopeError::InvalidUrl(format!("{}: {}", s, e)))?;
            let mut prefix = url.as_str().to_lowercase();
            if !s.ends_with('/') && url.path() == "/" && url.query().is_none() {
                prefix.pop();
            }
            return Ok(ScopeRule::UrlPrefix(prefix));
        }

        match s.strip_prefix("*.") {
            Some(host) => Ok(ScopeRule::host(host, true)),
            None => Ok(ScopeRule::host(s, false)),
        }
    }
}

impl fmt::Display for ScopeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeRule::Host { host, subdomains: true } => write!(f, "*.{}", host),
            ScopeRule::Host { host, subdomains: false } => write!(f, "{}", host),
            ScopeRule::UrlPrefix(prefix) => write!(f, "{}*", prefix),
            ScopeRule::Pattern(re) => write!(f, "re:{}", re.as_str()),
        }
    }
}

/// Include and exclude rules
///
/// Excludes win. With no include rules, everything not excluded is in scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    include: Vec<ScopeRule>,
    exclude: Vec<ScopeRule>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rule strings
    pub fn from_rules<I, E>(include: I, exclude: E) -> Result<Self, ScopeError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut scope = Self::new();
        for rule in include {
            scope.include.push(rule.as_ref().parse()?);
        }
        for rule in exclude {
            scope.exclude.push(rule.as_ref().parse()?);
        }
        Ok(scope)
    }

    pub fn add_include(&mut self, rule: ScopeRule) {
        self.include.push(rule);
    }

    pub fn add_exclude(&mut self, rule: ScopeRule) {
        self.exclude.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `url` is in scope. Unparsable URLs never are.
    pub fn is_in_scope(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };

        if self.exclude.iter().any(|rule| rule.matches(&url)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|rule| rule.matches(&url))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} include, {} exclude rules",
            self.include.len(),
            self.exclude.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatternError;

    fn rule(s: &str) -> ScopeRule {
        s.parse().unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_host_rule() {
        let exact = rule("acme.my.site.com");
        assert!(exact.matches(&url("https://acme.my.site.com/s/sfsites/aura")));
        assert!(exact.matches(&url("https://ACME.my.site.com/")));
        assert!(!exact.matches(&url("https://other.my.site.com/")));

        let wildcard = rule("*.force.com");
        assert!(wildcard.matches(&url("https://acme.force.com/")));
        assert!(wildcard.matches(&url("https://a.b.force.com/")));
        assert!(wildcard.matches(&url("https://force.com/")));
        assert!(!wildcard.matches(&url("https://notforce.com/")));
    }

    #[test]
    fn test_prefix_rule() {
        let prefix = rule("https://acme.my.site.com/s");
        assert!(prefix.matches(&url("https://acme.my.site.com/s/login")));
        assert!(!prefix.matches(&url("http://acme.my.site.com/s/login")));

        let bare = rule("https://acme.my.site.com");
        assert!(bare.matches(&url("https://acme.my.site.com/anything")));
    }

    #[test]
    fn test_regex_rule() {
        let re = rule(r"re:/s/sfsites/.*\.js");
        assert!(re.matches(&url("https://x.com/s/sfsites/auraFW/app.js")));
        assert!(!re.matches(&url("https://x.com/s/login")));
        assert!(matches!(
            "re:(".parse::<ScopeRule>(),
            Err(ScopeError::Pattern(PatternError::Syntax(_)))
        ));
    }

    #[test]
    fn test_regex_rule_is_screened() {
        assert!(matches!(
            "re:(a+)+$".parse::<ScopeRule>(),
            Err(ScopeError::Pattern(PatternError::Suspicious(_)))
        ));
        let long = format!("re:{}", "a".repeat(1001));
        assert!(matches!(
            long.parse::<ScopeRule>(),
            Err(ScopeError::Pattern(PatternError::TooLong { len: 1001, max: 1000 }))
        ));
        assert!(matches!(Scope::from_rules(["re:(.*)*"], Vec::<String>::new()), Err(ScopeError::Pattern(_))));
    }

    #[test]
    fn test_include_exclude() {
        let scope = Scope::from_rules(["*.site.com"], ["https://cdn.site.com"]).unwrap();
        assert!(scope.is_in_scope("https://acme.site.com/app.js"));
        assert!(!scope.is_in_scope("https://cdn.site.com/lib.js"));
        assert!(!scope.is_in_scope("https://other.com/"));
        assert!(!scope.is_in_scope("not a url"));
    }

    #[test]
    fn test_exclude_only_scope() {
        let scope = Scope::from_rules(Vec::<String>::new(), ["*.google-analytics.com"]).unwrap();
        assert!(scope.is_in_scope("https://acme.site.com/"));
        assert!(!scope.is_in_scope("https://www.google-analytics.com/ga.js"));
    }

    #[test]
    fn test_display() {
        assert_eq!(rule("*.force.com").to_string(), "*.force.com");
        assert_eq!(rule("https://a.com/s").to_string(), "https://a.com/s*");
        assert_eq!(Scope::from_rules(["a.com"], ["b.com"]).unwrap().summary(), "1 include, 1 exclude rules");
    }

    #[test]
    fn test_empty_rule_rejected() {
        assert_eq!("  ".parse::<ScopeRule>().unwrap_err(), ScopeError::Empty);
    }
}

//! Balanced-delimiter extraction
//!
//! Pulls delimiter-balanced regions (JSON-like objects by default) out of
//! arbitrary text. The scan is lexical: it tracks nesting depth, whether it
//! is inside a string literal, and whether the previous character was an
//! escaping backslash. Delimiters inside strings do not count. A region that
//! never closes before end-of-text is simply absent.

use regex::{Match, Regex};

/// A balanced region found in some text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedRegion<'t> {
    /// Byte offset of the opening delimiter
    pub start: usize,
    /// Region text, delimiters included
    pub text: &'t str,
}

impl<'t> ExtractedRegion<'t> {
    /// Byte offset just past the closing delimiter
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Text between the outer delimiters
    pub fn inner(&self) -> &'t str {
        &self.text[1..self.text.len() - 1]
    }
}

/// Delimiter-balanced region extractor
#[derive(Debug, Clone)]
pub struct BalancedExtractor {
    open: u8,
    close: u8,
    quotes: Vec<u8>,
}

impl Default for BalancedExtractor {
    fn default() -> Self {
        Self {
            open: b'{',
            close: b'}',
            quotes: vec![b'"'],
        }
    }
}

impl BalancedExtractor {
    /// Extractor for another pair of ASCII delimiters, e.g. `[` and `]`
    pub fn new(open: u8, close: u8) -> Self {
        Self {
            open,
            close,
            ..Self::default()
        }
    }

    /// Replace the set of string-literal quote characters
    pub fn with_quotes(mut self, quotes: &[u8]) -> Self {
        self.quotes = quotes.to_vec();
        self
    }

    /// Extract the balanced region opening at `start`
    ///
    /// Returns `None` if `text[start]` is not the open delimiter or the
    /// region is still open at end-of-text.
    pub fn extract_balanced<'t>(&self, text: &'t str, start: usize) -> Option<ExtractedRegion<'t>> {
        let bytes = text.as_bytes();
        if bytes.get(start) != Some(&self.open) {
            return None;
        }

        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == q {
                    quote = None;
                }
                continue;
            }

            if self.quotes.contains(&b) {
                quote = Some(b);
            } else if b == self.open {
                depth += 1;
            } else if b == self.close {
                depth -= 1;
                if depth == 0 {
                    // Delimiters are ASCII so i + 1 is a char boundary
                    return Some(ExtractedRegion {
                        start,
                        text: &text[start..=i],
                    });
                }
            }
        }

        None
    }

    /// Lazily find every `marker` occurrence and extract the region it opens
    ///
    /// The open delimiter is the last one inside the marker match, or else the
    /// first non-whitespace character after it. Searching resumes after each
    /// extracted region, so nested markers inside a region are not revisited.
    pub fn find_marker_then_extract<'a, 't>(&'a self, text: &'t str, marker: &'a Regex) -> Regions<'a, 't> {
        Regions {
            extractor: self,
            marker,
            text,
            pos: 0,
        }
    }

    fn open_position(&self, text: &str, m: &Match<'_>) -> Option<usize> {
        if let Some(offset) = m.as_str().bytes().rposition(|b| b == self.open) {
            return Some(m.start() + offset);
        }

        let (offset, c) = text[m.end()..].char_indices().find(|(_, c)| !c.is_whitespace())?;
        (c.is_ascii() && c as u8 == self.open).then_some(m.end() + offset)
    }
}

/// Iterator returned by [`BalancedExtractor::find_marker_then_extract`]
#[derive(Debug)]
pub struct Regions<'a, 't> {
    extractor: &'a BalancedExtractor,
    marker: &'a Regex,
    text: &'t str,
    pos: usize,
}

impl<'a, 't> Iterator for Regions<'a, 't> {
    type Item = ExtractedRegion<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos <= self.text.len() {
            let m = self.marker.find_at(self.text, self.pos)?;

            let region = self
                .extractor
                .open_position(self.text, &m)
                .and_then(|open| self.extractor.extract_balanced(self.text, open));

            if let Some(region) = region {
                self.pos = region.end();
                return Some(region);
            }

            // Unbalanced or no delimiter: move past this marker
            self.pos = if m.end() > m.start() {
                m.end()
            } else {
                match self.text[m.start()..].chars().next() {
                    Some(c) => m.start() + c.len_utf8(),
                    None => return None,
                }
            };
        }
        None
    }
}

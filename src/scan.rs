//! Markup reference scanning ("smartscan").
//!
//! A best-effort lexical pass over generated markup: every script tag either
//! contributes its `src` attribute verbatim or, for inline bodies, the
//! specifiers of any static import statements. This is not a parser;
//! malformed markup contributes nothing and never fails the scan.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Script block regex
    static ref SCRIPT_TAG_RE: Regex =
        Regex::new(r"(?is)<script\b([^>]*)>([\s\S]*?)</script>").unwrap();

    /// Attribute regex for parsing script attributes
    static ref ATTR_RE: Regex =
        Regex::new(r#"(?i)([a-z0-9-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap();

    /// Static import statement, tolerating a dynamic-import parenthesis
    static ref IMPORT_RE: Regex = Regex::new(r#"import\b[^'"]*?['"]([^'"]+)['"]\)?"#).unwrap();
}

/// Collect every module specifier referenced by `markup`, in document order.
///
/// Pure and restartable: the same input always yields the same sequence.
pub fn scan_markup(markup: &str) -> Vec<String> {
    let mut specifiers = Vec::new();

    for tag in SCRIPT_TAG_RE.captures_iter(markup) {
        let attrs = tag.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = tag.get(2).map(|m| m.as_str()).unwrap_or("");

        let src = ATTR_RE.captures_iter(attrs).find_map(|attr| {
            if attr[1].eq_ignore_ascii_case("src") {
                attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4))
            } else {
                None
            }
        });
        if let Some(src) = src {
            specifiers.push(src.as_str().to_string());
            continue;
        }

        for import in IMPORT_RE.captures_iter(body) {
            specifiers.push(import[1].to_string());
        }
    }

    specifiers
}

//! Segment URL construction.
//!
//! DASH media/initialization attributes are URL templates in which
//! `$RepresentationID$`, `$Number$`, `$Time$` and `$Bandwidth$` are
//! substituted per segment, the numeric ones optionally with a
//! `%0[width]d` padding specifier.

use regex::{Captures, Regex, Replacer};
use std::sync::LazyLock;
use url::Url;

use crate::MizukiResult;

// From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
// "For the avoidance of doubt, only %0[width]d is permitted and no other
// identifiers."
//
// Example template: "$RepresentationID$/$Number%06d$.m4s"
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(RepresentationID|Number|Time|Bandwidth)(?:%0([\d])d)?\$").unwrap()
});

/// Substitution values for one segment.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub representation_id: Option<String>,
    pub number: Option<u64>,
    pub time: Option<u64>,
    pub bandwidth: Option<u64>,
}

/// A URL template as declared by the manifest, kept unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentUrlTemplate(pub String);

impl SegmentUrlTemplate {
    pub fn resolve(&self, context: &TemplateContext) -> String {
        TEMPLATE_REGEX
            .replace_all(&self.0, TemplateReplacer(context))
            .to_string()
    }
}

struct TemplateReplacer<'a>(&'a TemplateContext);

impl Replacer for TemplateReplacer<'_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        let value = match caps.get(1).map(|m| m.as_str()) {
            Some("RepresentationID") => self.0.representation_id.clone(),
            Some("Number") => self.0.number.map(|n| n.to_string()),
            Some("Time") => self.0.time.map(|t| t.to_string()),
            Some("Bandwidth") => self.0.bandwidth.map(|b| b.to_string()),
            _ => None,
        };
        let Some(value) = value else {
            // Leave unknown or unset variables untouched.
            dst.push_str(caps.get(0).unwrap().as_str());
            return;
        };

        let width = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
        if let Some(width) = width {
            dst.push_str(&format!("{value:0>width$}"));
        } else {
            dst.push_str(&value);
        }
    }
}

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> MizukiResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // We are careful to merge the query portion of the current URL (which
        // is either the original manifest URL, or the URL that it redirected
        // to, or the value of a BaseURL element in the manifest) with the new
        // URL. But if the new URL already has a query string, it takes
        // precedence.
        //
        // Examples
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=old, /video42.mp4?auth=new) =>
        //   https://example.com/video42.mp4?auth=new
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}

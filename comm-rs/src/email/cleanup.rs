//! Reply/signature stripping for inbound text bodies
//!
//! An ordered list of marker patterns; everything at and after the first
//! occurrence of a marker is dropped, rule by rule, then the remainder is
//! trimmed. The order matters: signature markers run before forward and
//! reply headers, which run before plain quoted-line runs. The marker set
//! is a revisable policy list.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // signature delimiter
        r"(?m)^-- ?$",
        // mobile client signatures
        r"(?mi)^sent from my \S.*$",
        // forwarded message headers
        r"(?mi)^-{2,}\s*forwarded message\s*-{2,}.*$",
        r"(?mi)^begin forwarded message:.*$",
        // original-message separator
        r"(?mi)^-{2,}\s*original message\s*-{2,}.*$",
        // reply intro ("On <date>, <author> wrote:")
        r"(?mi)^on .{0,500}wrote:\s*$",
        // quoted header block
        r"(?mi)^from:\s?[^\r\n]*(\r?\n)(to|sent|subject|date|cc):\s?",
        // first run of quoted lines
        r"(?m)^>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("marker pattern must compile"))
    .collect()
});

/// Strip quoted replies, forwards, and signatures from a text body.
pub fn strip_quoted(text: &str) -> String {
    let mut result = text.to_string();
    for marker in MARKERS.iter() {
        if let Some(found) = marker.find(&result) {
            result.truncate(found.start());
        }
    }
    result.trim().to_string()
}

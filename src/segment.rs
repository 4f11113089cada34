//! Segment URL classification and rewriting.
//!
//! The streaming service requests audio/video chunks as byte ranges encoded in the
//! path (`.../range/0-1023?...`). Dropping the path yields a URL that serves the whole
//! resource in one response.

use url::{Position, Url};

use crate::error::{Error, Result};

/// Path marker of a byte-range request starting at offset zero
pub const SEGMENT_MARKER: &str = "/range/0-";

/// Whether `url` is a byte-range segment request starting at offset zero
///
/// Only the path component is inspected, so a marker in the query string or fragment
/// does not count. Input that does not parse as an absolute URL is never a segment.
pub fn is_segment_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.path().contains(SEGMENT_MARKER))
        .unwrap_or(false)
}

/// Rewrite a segment URL into its directly downloadable resource URL
///
/// Scheme, credentials, host, port, query and fragment are kept; the path is removed
/// entirely (no trailing `/`):
///
/// ```
/// use segment_dl::segment::to_downloadable;
///
/// let url = to_downloadable("https://media.example/foo/range/0-1023?id=5").unwrap();
/// assert_eq!(url, "https://media.example?id=5");
/// ```
pub fn to_downloadable(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(Error::MalformedUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        });
    }

    Ok(format!(
        "{}{}",
        &parsed[..Position::BeforePath],
        &parsed[Position::AfterPath..]
    ))
}

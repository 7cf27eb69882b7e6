//! URL resolution for detail links and download pointers.

use url::Url;

use super::error::ItemError;

/// Resolves `reference` against `base` using standard URL resolution.
///
/// Absolute references replace the base entirely. Only `http` and `https`
/// results are accepted.
///
/// ```
/// use scraping_by::crawl::resolve;
/// use url::Url;
///
/// let base = Url::parse("http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=1").unwrap();
/// let url = resolve(&base, "document.cfm?id=7").unwrap();
/// assert_eq!(url.as_str(), "http://dms.example.gov/pubdms/search/document.cfm?id=7");
/// ```
///
/// # Errors
///
/// Returns [`ItemError::InvalidLink`] if the reference does not parse or
/// resolves to a non-http(s) URL (`mailto:`, `javascript:` and the like).
pub fn resolve(base: &Url, reference: &str) -> Result<Url, ItemError> {
    let reference = reference.trim();
    let url = base
        .join(reference)
        .map_err(|e| ItemError::invalid_link(reference, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ItemError::invalid_link(
            reference,
            format!("unsupported scheme {other:?}"),
        )),
    }
}

/// Percent-decodes a download pointer taken from a hidden form field.
///
/// # Errors
///
/// Returns [`ItemError::InvalidPointer`] if the decoded bytes are not UTF-8.
pub fn decode_pointer(raw: &str) -> Result<String, ItemError> {
    urlencoding::decode(raw.trim())
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ItemError::invalid_pointer(raw, e.to_string()))
}

/// Decodes `raw` and resolves it against `download_base`.
///
/// # Errors
///
/// Returns [`ItemError::InvalidPointer`] if decoding or resolution fails.
pub fn resolve_pointer(download_base: &Url, raw: &str) -> Result<Url, ItemError> {
    let decoded = decode_pointer(raw)?;
    resolve(download_base, &decoded).map_err(|e| match e {
        ItemError::InvalidLink { reason, .. } => ItemError::invalid_pointer(raw, reason),
        other => other,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=55219").unwrap()
    }

    #[test]
    fn test_resolve_relative_and_root_relative() {
        assert_eq!(
            resolve(&base(), "document.cfm?id=1").unwrap().as_str(),
            "http://dms.example.gov/pubdms/search/document.cfm?id=1"
        );
        assert_eq!(
            resolve(&base(), "/pubdms/document.cfm?id=1").unwrap().as_str(),
            "http://dms.example.gov/pubdms/document.cfm?id=1"
        );
    }

    #[test]
    fn test_resolve_absolute_replaces_base() {
        assert_eq!(
            resolve(&base(), "https://mirror.example.org/doc?id=2")
                .unwrap()
                .as_str(),
            "https://mirror.example.org/doc?id=2"
        );
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        let err = resolve(&base(), "mailto:clerk@example.gov").unwrap_err();
        assert!(matches!(err, ItemError::InvalidLink { .. }), "got: {err}");
        let err = resolve(&base(), "javascript:void(0)").unwrap_err();
        assert!(matches!(err, ItemError::InvalidLink { .. }), "got: {err}");
    }

    #[test]
    fn test_decode_pointer() {
        assert_eq!(
            decode_pointer("%2Fpubdms%2Fdocs%2F55219%2Freport%20final.pdf").unwrap(),
            "/pubdms/docs/55219/report final.pdf"
        );
        assert_eq!(decode_pointer("plain.pdf").unwrap(), "plain.pdf");
    }

    #[test]
    fn test_decode_pointer_invalid_utf8() {
        let err = decode_pointer("%FF%FE").unwrap_err();
        assert!(matches!(err, ItemError::InvalidPointer { .. }), "got: {err}");
    }

    #[test]
    fn test_resolve_pointer_against_download_base() {
        let download_base = Url::parse("http://dms.example.gov/").unwrap();
        let url = resolve_pointer(&download_base, "pubdms%2Fdocs%2Fa.pdf").unwrap();
        assert_eq!(url.as_str(), "http://dms.example.gov/pubdms/docs/a.pdf");

        let url = resolve_pointer(&download_base, "%2Fother%2Fb%20c.pdf").unwrap();
        assert_eq!(url.as_str(), "http://dms.example.gov/other/b%20c.pdf");
    }

    #[test]
    fn test_resolve_pointer_bad_scheme_is_pointer_error() {
        let download_base = Url::parse("http://dms.example.gov/").unwrap();
        let err = resolve_pointer(&download_base, "ftp%3A%2F%2Fx%2Fa.pdf").unwrap_err();
        assert!(matches!(err, ItemError::InvalidPointer { .. }), "got: {err}");
    }
}

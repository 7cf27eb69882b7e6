//! User-Agent string sent with every crawl request.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/scraping-by";

/// Default User-Agent for crawl requests (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("scraping-by/{version} (document-crawler; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("scraping-by/")
                .and_then(|s| s.split(' ').next()),
            "UA must contain crate version"
        );
    }
}

use regex::Regex;
use std::sync::LazyLock;

static EB2_SERVICE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:dsl|fiber|cable|kinetic)$").expect("valid regex"));

static LEADING_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:dsr|agg|comcastagg|not\s+dsr|--|-)\s+").expect("valid regex")
});

static SERVICE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\s*(?:extended\s+cable|workplace|broadband\s+ii|fiber\s+plus|/boi|/embarq|/qwest|cable|dsl|fiber)$",
    )
    .expect("valid regex")
});

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s&/\-]").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Values the tracking exports use for "no provider".
const EMPTY_MARKERS: &[&str] = &["nan", "null", "none", "unknown"];

/// Canonical comparison key for a provider string.
///
/// `"EB2-Cox Business/BOI"` becomes `"cox business"`, `"DSR AT&T"` becomes
/// `"at&t"`. The result is for comparison only, never for display.
pub fn normalize_provider(raw: &str) -> String {
    let mut provider = raw.trim().to_lowercase();
    if provider.is_empty() {
        return provider;
    }

    if let Some(rest) = provider.strip_prefix("eb2-") {
        provider = EB2_SERVICE_SUFFIX.replace(rest, "").into_owned();
    }

    provider = LEADING_PREFIX.replace(&provider, "").into_owned();
    provider = SERVICE_SUFFIX.replace(&provider, "").into_owned();
    provider = DISALLOWED_CHARS.replace_all(&provider, " ").into_owned();
    WHITESPACE.replace_all(&provider, " ").trim().to_string()
}

/// True for blank strings and placeholder values such as `nan` or `Unknown`.
pub fn is_blank_provider(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || EMPTY_MARKERS.contains(&trimmed.to_lowercase().as_str())
}

/// Whitespace-collapsed, lowercased form used for exact comparisons.
pub fn simple_key(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eb2_prefix_and_boi_suffix() {
        assert_eq!(normalize_provider("EB2-Cox Business/BOI"), "cox business");
        assert_eq!(normalize_provider("EB2-CenturyLink DSL"), "centurylink");
        assert_eq!(normalize_provider("EB2-Frontier Fiber"), "frontier");
    }

    #[test]
    fn test_known_prefixes_removed() {
        assert_eq!(normalize_provider("DSR AT&T"), "at&t");
        assert_eq!(normalize_provider("AGG Comcast"), "comcast");
        assert_eq!(normalize_provider("Not DSR Verizon"), "verizon");
        assert_eq!(normalize_provider("-- Spectrum"), "spectrum");
    }

    #[test]
    fn test_service_suffixes_removed() {
        assert_eq!(normalize_provider("AT&T Broadband II"), "at&t");
        assert_eq!(normalize_provider("Comcast Workplace"), "comcast");
        assert_eq!(normalize_provider("Cox Extended Cable"), "cox");
        assert_eq!(normalize_provider("CenturyLink/Embarq"), "centurylink");
    }

    #[test]
    fn test_punctuation_replaced_but_ampersand_kept() {
        assert_eq!(normalize_provider("Charter Communications, LLC."), "charter communications llc");
        assert_eq!(normalize_provider("  AT&T   Enterprises "), "at&t enterprises");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_provider(""), "");
        assert_eq!(normalize_provider("   "), "");
    }

    #[test]
    fn test_blank_markers() {
        assert!(is_blank_provider("nan"));
        assert!(is_blank_provider(" Unknown "));
        assert!(is_blank_provider(""));
        assert!(!is_blank_provider("Comcast"));
    }
}

use super::normalize::{normalize_provider, simple_key};
use std::collections::HashMap;

/// 常見的 DSR / ARIN 寫法對應到標準供應商名稱
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("spectrum", "Charter Communications"),
    ("charter", "Charter Communications"),
    ("charter communications", "Charter Communications"),
    ("cox business/boi", "Cox Communications"),
    ("cox business boi extended cable", "Cox Communications"),
    ("cox business", "Cox Communications"),
    ("cox communications", "Cox Communications"),
    ("cox", "Cox Communications"),
    ("comcast workplace", "Comcast"),
    ("comcast workplace cable", "Comcast"),
    ("comcast cable", "Comcast"),
    ("agg comcast", "Comcast"),
    ("comcastagg comcast", "Comcast"),
    ("comcast", "Comcast"),
    ("comcastagg clink dsl", "CenturyLink"),
    ("clink", "CenturyLink"),
    ("centurylink", "CenturyLink"),
    ("lumen", "CenturyLink"),
    ("lumen technologies", "CenturyLink"),
    ("level 3", "CenturyLink"),
    ("qwest", "CenturyLink"),
    ("embarq", "CenturyLink"),
    ("at&t broadband ii", "AT&T"),
    ("at&t abf", "AT&T"),
    ("at&t adi", "AT&T"),
    ("at&t", "AT&T"),
    ("att", "AT&T"),
    ("verizon cell", "Verizon"),
    ("vzw cell", "Verizon"),
    ("cell", "Verizon"),
    ("verizon business", "Verizon"),
    ("verizon wireless", "Verizon"),
    ("verizon", "Verizon"),
    ("digi", "Digi"),
    ("digi cellular", "Digi"),
    ("starlink", "Starlink"),
    ("inseego", "Inseego"),
    ("mediacom/boi", "Mediacom"),
    ("mediacom communications", "Mediacom"),
    ("mediacom", "Mediacom"),
    ("frontier communications", "Frontier"),
    ("frontier", "Frontier"),
    ("windstream", "Windstream"),
    ("brightspeed", "Brightspeed"),
    ("optimum", "Optimum"),
    ("altice", "Optimum"),
    ("cable one", "Cable One"),
    ("cableone", "Cable One"),
    ("sparklight", "Cable One"),
];

/// Provider variants mapped to one canonical name.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AliasTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        for (alias, canonical) in DEFAULT_ALIASES {
            table.insert(alias, canonical);
        }
        table
    }

    /// Adds (or replaces) one alias. Keys are stored lowercased.
    pub fn insert(&mut self, alias: &str, canonical: &str) {
        let key = simple_key(alias);
        if key.is_empty() {
            return;
        }
        self.entries.insert(key, canonical.trim().to_string());
    }

    pub fn extend<'a, I>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (alias, canonical) in aliases {
            self.insert(alias, canonical);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical name for `provider`, if any alias applies.
    ///
    /// Exact key on the lowercased input wins, then exact key on the
    /// normalized input, then the longest key found inside the normalized
    /// input on word boundaries.
    pub fn lookup(&self, provider: &str) -> Option<&str> {
        let lowered = simple_key(provider);
        if lowered.is_empty() {
            return None;
        }
        if let Some(canonical) = self.entries.get(&lowered) {
            return Some(canonical);
        }

        let normalized = normalize_provider(provider);
        if normalized.is_empty() {
            return None;
        }
        if let Some(canonical) = self.entries.get(&normalized) {
            return Some(canonical);
        }

        self.entries
            .iter()
            .filter(|(key, _)| contains_words(&normalized, key))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, canonical)| canonical.as_str())
    }

    /// Canonical name, or the trimmed input when no alias applies.
    pub fn canonical(&self, provider: &str) -> String {
        self.lookup(provider)
            .map(str::to_string)
            .unwrap_or_else(|| provider.trim().to_string())
    }
}

/// `needle` occurs in `haystack` and is bounded by non-alphanumerics.
fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_normalized_lookup() {
        let table = AliasTable::with_defaults();
        assert_eq!(table.lookup("Spectrum"), Some("Charter Communications"));
        assert_eq!(table.lookup("EB2-Cox Business/BOI"), Some("Cox Communications"));
        assert_eq!(table.lookup("DSR AT&T"), Some("AT&T"));
    }

    #[test]
    fn test_word_boundary_containment() {
        let table = AliasTable::with_defaults();
        assert_eq!(table.lookup("Comcast Cable Communications, LLC"), Some("Comcast"));
        // "cell" must not hit inside "cellco"
        assert_eq!(table.lookup("Cellco Partnership"), None);
    }

    #[test]
    fn test_longest_key_wins() {
        let table = AliasTable::with_defaults();
        assert_eq!(table.lookup("verizon business services"), Some("Verizon"));
        assert_eq!(table.lookup("cox business services"), Some("Cox Communications"));
    }

    #[test]
    fn test_canonical_passthrough() {
        let table = AliasTable::with_defaults();
        assert_eq!(table.canonical("  Acme Wireless "), "Acme Wireless");
        assert_eq!(table.canonical("Lumen"), "CenturyLink");
    }

    #[test]
    fn test_extend_from_config() {
        let mut table = AliasTable::empty();
        let mut extra = HashMap::new();
        extra.insert("Allo Fiber".to_string(), "ALLO Communications".to_string());
        table.extend(&extra);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("allo fiber"), Some("ALLO Communications"));
    }
}

use crate::domain::model::ProviderMapping;
use std::collections::HashMap;

const IGNORED_MAPPING_TYPE: &str = "ignore";

#[derive(Debug, Clone, PartialEq)]
struct MappingEntry {
    arin_provider: String,
    mapping_type: String,
    confidence: u8,
}

/// A hit in the persisted `provider_mappings` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingHit {
    pub confidence: u8,
    pub mapping_type: String,
    pub reversed: bool,
}

impl MappingHit {
    pub fn reason(&self) -> String {
        if self.reversed {
            format!("Reverse mapped via {}", self.mapping_type)
        } else {
            format!("Mapped via {}", self.mapping_type)
        }
    }
}

/// In-memory index over `provider_mappings`, keyed by lowercased DSR name.
#[derive(Debug, Clone, Default)]
pub struct MappingIndex {
    by_dsr: HashMap<String, Vec<MappingEntry>>,
}

impl MappingIndex {
    pub fn from_rows(rows: impl IntoIterator<Item = ProviderMapping>) -> Self {
        let mut by_dsr: HashMap<String, Vec<MappingEntry>> = HashMap::new();

        for row in rows {
            if row.mapping_type.eq_ignore_ascii_case(IGNORED_MAPPING_TYPE) {
                continue;
            }
            let key = row.dsr_provider.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            by_dsr.entry(key).or_default().push(MappingEntry {
                arin_provider: row.arin_provider.trim().to_string(),
                mapping_type: row.mapping_type,
                confidence: row.confidence_score.clamp(0, 100) as u8,
            });
        }

        for entries in by_dsr.values_mut() {
            entries.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        }

        Self { by_dsr }
    }

    pub fn len(&self) -> usize {
        self.by_dsr.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dsr.is_empty()
    }

    pub fn lookup(&self, dsr_provider: &str, arin_provider: &str) -> Option<MappingHit> {
        let dsr_key = dsr_provider.trim().to_lowercase();
        let arin_key = arin_provider.trim().to_lowercase();
        if dsr_key.is_empty() || arin_key.is_empty() {
            return None;
        }

        if let Some(entries) = self.by_dsr.get(&dsr_key) {
            if let Some(entry) = entries
                .iter()
                .find(|e| e.arin_provider.to_lowercase() == arin_key)
            {
                return Some(MappingHit {
                    confidence: entry.confidence,
                    mapping_type: entry.mapping_type.clone(),
                    reversed: false,
                });
            }
        }

        // 反向：ARIN 名稱出現在 DSR 欄位
        self.by_dsr.get(&arin_key).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.arin_provider.to_lowercase() == dsr_key)
                .map(|entry| MappingHit {
                    confidence: entry.confidence,
                    mapping_type: entry.mapping_type.clone(),
                    reversed: true,
                })
        })
    }
}

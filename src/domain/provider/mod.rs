//! Provider-name reconciliation between DSR tracking data and ARIN lookups.

pub mod alias;
pub mod mapping;
pub mod matcher;
pub mod normalize;

pub use alias::AliasTable;
pub use mapping::{MappingHit, MappingIndex};
pub use matcher::{
    suggest_mapping, MatchMethod, MatchOutcome, MatchStats, MatchStatus, MatcherSettings,
    ProviderMatcher, SecondaryConflictRule,
};
pub use normalize::{is_blank_provider, normalize_provider};

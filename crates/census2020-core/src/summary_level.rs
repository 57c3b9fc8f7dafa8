//! Geographic summary levels present in the state-level redistricting files.
//!
//! A summary level is stored in the `SUMLEV` column as a three-digit code.
//! Callers may name a level either by that code or by the kebab-case name
//! in this catalog (`"050"` and `"state-county"` are the same filter).

use std::fmt;

/// One geographic summary level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummaryLevel {
    /// Three-digit code as stored in `SUMLEV`.
    pub code: &'static str,
    /// Kebab-case name.
    pub name: &'static str,
}

const fn level(code: &'static str, name: &'static str) -> SummaryLevel {
    SummaryLevel { code, name }
}

const LEVELS: &[SummaryLevel] = &[
    level("040", "state"),
    level("050", "state-county"),
    level("060", "state-county-county-subdivision"),
    level("067", "state-county-county-subdivision-subminor-civil-division"),
    level("140", "state-county-tract"),
    level("150", "state-county-tract-block-group"),
    level("155", "state-place-county"),
    level("160", "state-place"),
    level("170", "state-consolidated-city"),
    level("172", "state-consolidated-city-place"),
    level("230", "state-alaska-native-regional-corporation"),
    level("280", "state-american-indian-area"),
    level("281", "state-american-indian-area-tribal-subdivision"),
    level("283", "state-american-indian-area-reservation"),
    level("286", "state-american-indian-area-trust-land"),
    level("500", "state-congressional-district"),
    level("610", "state-legislative-district-upper"),
    level("620", "state-legislative-district-lower"),
    level("700", "state-county-voting-district"),
    level("750", "state-county-tract-block-group-block"),
    level("871", "state-zcta"),
    level("950", "state-school-district-elementary"),
    level("960", "state-school-district-secondary"),
    level("970", "state-school-district-unified"),
];

impl SummaryLevel {
    /// State.
    pub const STATE: SummaryLevel = level("040", "state");
    /// State-County.
    pub const STATE_COUNTY: SummaryLevel = level("050", "state-county");
    /// State-County-Census Tract.
    pub const STATE_COUNTY_TRACT: SummaryLevel = level("140", "state-county-tract");
    /// Tabulation block.
    pub const BLOCK: SummaryLevel = level("750", "state-county-tract-block-group-block");

    /// Every known level.
    pub fn all() -> &'static [SummaryLevel] {
        LEVELS
    }

    /// Resolve a level by code or kebab-case name (case-insensitive,
    /// `_` accepted in place of `-`).
    pub fn lookup(value: &str) -> Option<SummaryLevel> {
        let value = value.trim();
        LEVELS.iter().copied().find(|l| {
            l.code == value
                || (l.name.len() == value.len()
                    && l
                        .name
                        .bytes()
                        .zip(value.bytes())
                        .all(|(a, b)| a == b.to_ascii_lowercase() || (a == b'-' && b == b'_')))
        })
    }
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_code_or_name() {
        assert_eq!(SummaryLevel::lookup("050"), Some(SummaryLevel::STATE_COUNTY));
        assert_eq!(SummaryLevel::lookup("state-county"), Some(SummaryLevel::STATE_COUNTY));
        assert_eq!(SummaryLevel::lookup("STATE_COUNTY"), Some(SummaryLevel::STATE_COUNTY));
        assert_eq!(SummaryLevel::lookup(" 040 "), Some(SummaryLevel::STATE));
    }

    #[test]
    fn unknown_levels_do_not_resolve() {
        assert_eq!(SummaryLevel::lookup("051"), None);
        assert_eq!(SummaryLevel::lookup("county"), None);
        assert_eq!(SummaryLevel::lookup(""), None);
    }

    #[test]
    fn codes_and_names_are_unique() {
        let all = SummaryLevel::all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code, b.code);
                assert_ne!(a.name, b.name);
            }
        }
    }
}

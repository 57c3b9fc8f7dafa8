//! Reference table of jurisdictions published in the redistricting extract.
//!
//! A jurisdiction can be named by postal code (`"WY"`, case-insensitive), by
//! full name (`"Wyoming"`) or by its two-digit numeric code (`"56"`).

use std::fmt;

/// What sort of entity a jurisdiction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JurisdictionKind {
    /// One of the 50 states.
    State,
    /// The District of Columbia.
    District,
    /// Puerto Rico.
    Territory,
}

/// A state or state-equivalent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jurisdiction {
    /// Two-letter postal code, upper case.
    pub abbr: &'static str,
    /// Official name.
    pub name: &'static str,
    /// Two-digit numeric (FIPS) code.
    pub fips: &'static str,
    /// Entity kind.
    pub kind: JurisdictionKind,
}

const fn j(abbr: &'static str, name: &'static str, fips: &'static str) -> Jurisdiction {
    Jurisdiction {
        abbr,
        name,
        fips,
        kind: JurisdictionKind::State,
    }
}

const JURISDICTIONS: &[Jurisdiction] = &[
    j("AL", "Alabama", "01"),
    j("AK", "Alaska", "02"),
    j("AZ", "Arizona", "04"),
    j("AR", "Arkansas", "05"),
    j("CA", "California", "06"),
    j("CO", "Colorado", "08"),
    j("CT", "Connecticut", "09"),
    j("DE", "Delaware", "10"),
    Jurisdiction {
        abbr: "DC",
        name: "District of Columbia",
        fips: "11",
        kind: JurisdictionKind::District,
    },
    j("FL", "Florida", "12"),
    j("GA", "Georgia", "13"),
    j("HI", "Hawaii", "15"),
    j("ID", "Idaho", "16"),
    j("IL", "Illinois", "17"),
    j("IN", "Indiana", "18"),
    j("IA", "Iowa", "19"),
    j("KS", "Kansas", "20"),
    j("KY", "Kentucky", "21"),
    j("LA", "Louisiana", "22"),
    j("ME", "Maine", "23"),
    j("MD", "Maryland", "24"),
    j("MA", "Massachusetts", "25"),
    j("MI", "Michigan", "26"),
    j("MN", "Minnesota", "27"),
    j("MS", "Mississippi", "28"),
    j("MO", "Missouri", "29"),
    j("MT", "Montana", "30"),
    j("NE", "Nebraska", "31"),
    j("NV", "Nevada", "32"),
    j("NH", "New Hampshire", "33"),
    j("NJ", "New Jersey", "34"),
    j("NM", "New Mexico", "35"),
    j("NY", "New York", "36"),
    j("NC", "North Carolina", "37"),
    j("ND", "North Dakota", "38"),
    j("OH", "Ohio", "39"),
    j("OK", "Oklahoma", "40"),
    j("OR", "Oregon", "41"),
    j("PA", "Pennsylvania", "42"),
    j("RI", "Rhode Island", "44"),
    j("SC", "South Carolina", "45"),
    j("SD", "South Dakota", "46"),
    j("TN", "Tennessee", "47"),
    j("TX", "Texas", "48"),
    j("UT", "Utah", "49"),
    j("VT", "Vermont", "50"),
    j("VA", "Virginia", "51"),
    j("WA", "Washington", "53"),
    j("WV", "West Virginia", "54"),
    j("WI", "Wisconsin", "55"),
    j("WY", "Wyoming", "56"),
    Jurisdiction {
        abbr: "PR",
        name: "Puerto Rico",
        fips: "72",
        kind: JurisdictionKind::Territory,
    },
];

impl Jurisdiction {
    /// Every jurisdiction in the table, ordered by numeric code.
    pub fn all() -> &'static [Jurisdiction] {
        JURISDICTIONS
    }

    /// The 50 states plus the District of Columbia; the default set for a
    /// bulk pull.
    pub fn states_and_district() -> impl Iterator<Item = &'static Jurisdiction> {
        JURISDICTIONS
            .iter()
            .filter(|j| j.kind != JurisdictionKind::Territory)
    }

    /// Resolve a postal code, name or numeric code.
    pub fn lookup(code: &str) -> Option<&'static Jurisdiction> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        if code.bytes().all(|b| b.is_ascii_digit()) {
            return JURISDICTIONS
                .iter()
                .find(|j| j.fips == code || (code.len() == 1 && j.fips == format!("0{code}")));
        }

        JURISDICTIONS
            .iter()
            .find(|j| j.abbr.eq_ignore_ascii_case(code) || j.name.eq_ignore_ascii_case(code))
    }

    /// Lower-case postal code; used for file names.
    pub fn file_stem(&self) -> String {
        self.abbr.to_ascii_lowercase()
    }

    /// Directory name the Census Bureau publishes this jurisdiction under.
    pub fn publication_dir(&self) -> String {
        self.name.replace(' ', "_")
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbr)
    }
}

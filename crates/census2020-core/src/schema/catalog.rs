//! Field catalogs for the 2020 P.L. 94-171 extract.
//!
//! These are data, not logic. A future vintage is added by writing a new set
//! of tables here and pointing the registry at them.

use super::FieldType::{self, Int64, Text};

/// Geographic header (`..geo2020.pl`), in file order.
pub(crate) const GEO_FIELDS: &[(&str, FieldType)] = &[
    ("FILEID", Text),
    ("STUSAB", Text),
    ("SUMLEV", Text),
    ("GEOVAR", Text),
    ("GEOCOMP", Text),
    ("CHARITER", Text),
    ("CIFSN", Text),
    ("LOGRECNO", Int64),
    ("GEOID", Text),
    ("GEOCODE", Text),
    ("REGION", Text),
    ("DIVISION", Text),
    ("STATE", Text),
    ("STATENS", Text),
    ("COUNTY", Text),
    ("COUNTYCC", Text),
    ("COUNTYNS", Text),
    ("COUSUB", Text),
    ("COUSUBCC", Text),
    ("COUSUBNS", Text),
    ("SUBMCD", Text),
    ("SUBMCDCC", Text),
    ("SUBMCDNS", Text),
    ("ESTATE", Text),
    ("ESTATECC", Text),
    ("ESTATENS", Text),
    ("CONCIT", Text),
    ("CONCITCC", Text),
    ("CONCITNS", Text),
    ("PLACE", Text),
    ("PLACECC", Text),
    ("PLACENS", Text),
    ("TRACT", Text),
    ("BLKGRP", Text),
    ("BLOCK", Text),
    ("AIANHH", Text),
    ("AIHHTLI", Text),
    ("AIANHHFP", Text),
    ("AIANHHCC", Text),
    ("AIANHHNS", Text),
    ("AITS", Text),
    ("AITSFP", Text),
    ("AITSCC", Text),
    ("AITSNS", Text),
    ("TTRACT", Text),
    ("TBLKGRP", Text),
    ("ANRC", Text),
    ("ANRCCC", Text),
    ("ANRCNS", Text),
    ("CBSA", Text),
    ("MEMI", Text),
    ("CSA", Text),
    ("METDIV", Text),
    ("NECTA", Text),
    ("NMEMI", Text),
    ("CNECTA", Text),
    ("NECTADIV", Text),
    ("CBSAPCI", Text),
    ("NECTAPCI", Text),
    ("UA", Text),
    ("UATYPE", Text),
    ("UR", Text),
    ("CD116", Text),
    ("CD118", Text),
    ("CD119", Text),
    ("CD120", Text),
    ("CD121", Text),
    ("SLDU18", Text),
    ("SLDU22", Text),
    ("SLDU24", Text),
    ("SLDU26", Text),
    ("SLDU28", Text),
    ("SLDL18", Text),
    ("SLDL22", Text),
    ("SLDL24", Text),
    ("SLDL26", Text),
    ("SLDL28", Text),
    ("VTD", Text),
    ("VTDI", Text),
    ("ZCTA", Text),
    ("SDELM", Text),
    ("SDSEC", Text),
    ("SDUNI", Text),
    ("PUMA", Text),
    ("AREALAND", Int64),
    ("AREAWATR", Int64),
    ("BASENAME", Text),
    ("NAME", Text),
    ("FUNCSTAT", Text),
    ("GCUNI", Text),
    ("POP100", Int64),
    ("HU100", Int64),
    ("INTPTLAT", Text),
    ("INTPTLON", Text),
    ("LSADC", Text),
    ("PARTFLAG", Text),
    ("UGA", Text),
];

/// Leading fields shared by every count fragment, in file order.
pub(crate) const COUNT_PREFIX_FIELDS: &[(&str, FieldType)] = &[
    ("FILEID", Text),
    ("STUSAB", Text),
    ("CHARITER", Text),
    ("CIFSN", Text),
    ("LOGRECNO", Int64),
];

/// A published table inside a count fragment: `id` followed by a four-digit
/// cell number forms each field name (`P001` cell 7 is `P0010007`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct CountTable {
    pub(crate) id: &'static str,
    pub(crate) cells: u16,
}

const fn table(id: &'static str, cells: u16) -> CountTable {
    CountTable { id, cells }
}

/// Part 1 (`..12020.pl`): race, and Hispanic or Latino by race.
pub(crate) const PART1_TABLES: &[CountTable] = &[table("P001", 71), table("P002", 73)];

/// Part 2 (`..22020.pl`): the 18-and-over counterparts plus housing occupancy.
pub(crate) const PART2_TABLES: &[CountTable] = &[
    table("P003", 71),
    table("P004", 73),
    table("H001", 3),
];

/// Part 3 (`..32020.pl`): group quarters population by type.
pub(crate) const PART3_TABLES: &[CountTable] = &[table("P005", 10)];

//! Synthetic fragment and archive fixtures for unit tests.

use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::schema::{FragmentKind, TextEncoding, schema_for};

/// One geographic unit, rendered consistently into all four fragments.
#[derive(Debug, Clone)]
pub(crate) struct FragmentRow {
    pub(crate) stusab: String,
    pub(crate) state: String,
    pub(crate) sumlev: String,
    pub(crate) county: String,
    pub(crate) tract: String,
    pub(crate) geoid: String,
    pub(crate) name: String,
    pub(crate) logrecno: i64,
    pub(crate) pop: i64,
    pub(crate) housing: i64,
}

impl FragmentRow {
    fn base(abbr: &str, fips: &str, logrecno: i64) -> Self {
        let pop = 1_000 + logrecno * 7;
        Self {
            stusab: abbr.to_string(),
            state: fips.to_string(),
            sumlev: String::new(),
            county: String::new(),
            tract: String::new(),
            geoid: String::new(),
            name: String::new(),
            logrecno,
            pop,
            housing: pop / 2,
        }
    }

    pub(crate) fn state(abbr: &str, fips: &str, logrecno: i64) -> Self {
        Self {
            sumlev: "040".into(),
            geoid: format!("0400000US{fips}"),
            name: format!("State {abbr}"),
            ..Self::base(abbr, fips, logrecno)
        }
    }

    /// County code is the `logrecno`-th odd number, so record 1 is `001`.
    pub(crate) fn county(abbr: &str, fips: &str, logrecno: i64) -> Self {
        let county = format!("{:03}", 2 * logrecno - 1);
        Self {
            sumlev: "050".into(),
            geoid: format!("0500000US{fips}{county}"),
            name: format!("County {county}"),
            county,
            ..Self::base(abbr, fips, logrecno)
        }
    }

    pub(crate) fn tract(abbr: &str, fips: &str, county: &str, logrecno: i64) -> Self {
        let tract = format!("{:06}", logrecno * 100);
        Self {
            sumlev: "140".into(),
            geoid: format!("1400000US{fips}{county}{tract}"),
            name: format!("Census Tract {}", logrecno),
            county: county.to_string(),
            tract,
            ..Self::base(abbr, fips, logrecno)
        }
    }

    fn geo_value(&self, field: &str) -> String {
        match field {
            "FILEID" => "PLST".into(),
            "STUSAB" => self.stusab.clone(),
            "SUMLEV" => self.sumlev.clone(),
            "GEOVAR" => "00".into(),
            "GEOCOMP" | "CHARITER" => "000".into(),
            "LOGRECNO" => self.logrecno.to_string(),
            "GEOID" => self.geoid.clone(),
            "GEOCODE" => format!("{}{}{}", self.state, self.county, self.tract),
            "STATE" => self.state.clone(),
            "COUNTY" => self.county.clone(),
            "TRACT" => self.tract.clone(),
            "NAME" | "BASENAME" => self.name.clone(),
            "POP100" => self.pop.to_string(),
            "HU100" => self.housing.to_string(),
            "AREALAND" => (self.logrecno * 1_000).to_string(),
            "AREAWATR" => "0".into(),
            _ => String::new(),
        }
    }

    fn count_value(&self, kind: FragmentKind, field: &str, index: usize) -> String {
        match field {
            "FILEID" => "PLST".into(),
            "STUSAB" => self.stusab.clone(),
            "CHARITER" => "000".into(),
            "CIFSN" => format!("{:02}", kind as usize),
            "LOGRECNO" => self.logrecno.to_string(),
            // Table totals mirror the geo header so aligned rows are checkable.
            f if f.starts_with('H') && f.ends_with("0001") => self.housing.to_string(),
            f if f.ends_with("0001") => self.pop.to_string(),
            _ => ((self.logrecno + index as i64) % 10).to_string(),
        }
    }

    fn render(&self, kind: FragmentKind) -> String {
        let values: Vec<String> = schema_for(kind)
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, f)| match kind {
                FragmentKind::Geo => self.geo_value(f.name()),
                _ => self.count_value(kind, f.name(), idx),
            })
            .collect();
        values.join("|")
    }
}

/// Latin-1 encoded fragment text, one `\n`-terminated line per row.
pub(crate) fn fragment_bytes(kind: FragmentKind, rows: &[FragmentRow]) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rows {
        let line = row.render(kind);
        let encoded = TextEncoding::Latin1
            .encode(&line)
            .expect("fixture text must be representable in Latin-1");
        out.extend_from_slice(&encoded);
        out.push(b'\n');
    }
    out
}

/// Build an in-memory zip archive from `(name, contents)` pairs.
pub(crate) fn zip_entries(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(*name, options)?;
        writer.write_all(contents)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Entry name as published, e.g. `wygeo2020.pl` or `wy000012020.pl`.
pub(crate) fn fragment_file_name(abbr: &str, kind: FragmentKind) -> String {
    let stem = abbr.to_ascii_lowercase();
    match kind {
        FragmentKind::Geo => format!("{stem}{}", kind.archive_suffix()),
        _ => format!("{stem}0000{}", kind.archive_suffix()),
    }
}

/// A complete `<abbr>2020.pl.zip` image holding all four fragments for `rows`.
pub(crate) fn jurisdiction_archive(
    abbr: &str,
    rows: &[FragmentRow],
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let files: Vec<(String, Vec<u8>)> = FragmentKind::ALL
        .into_iter()
        .map(|kind| (fragment_file_name(abbr, kind), fragment_bytes(kind, rows)))
        .collect();
    let entries: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    zip_entries(&entries)
}

#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use census2020_core::schema::{FragmentKind, TextEncoding, schema_for};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// First county of every fixture; exercises a non-ASCII Latin-1 byte.
pub const FIRST_COUNTY_NAME: &str = "Doña Ana County";

struct GeoUnit {
    sumlev: &'static str,
    geoid: String,
    county: String,
    tract: String,
    name: String,
    logrecno: i64,
}

/// A state row, `counties` county rows and one tract, in `LOGRECNO` order.
fn units(fips: &str, counties: usize) -> Vec<GeoUnit> {
    let mut units = vec![GeoUnit {
        sumlev: "040",
        geoid: format!("0400000US{fips}"),
        county: String::new(),
        tract: String::new(),
        name: format!("State {fips}"),
        logrecno: 1,
    }];

    for i in 0..counties {
        let county = format!("{:03}", 2 * i + 1);
        units.push(GeoUnit {
            sumlev: "050",
            geoid: format!("0500000US{fips}{county}"),
            name: if i == 0 {
                FIRST_COUNTY_NAME.to_string()
            } else {
                format!("County {county}")
            },
            county,
            tract: String::new(),
            logrecno: i as i64 + 2,
        });
    }

    units.push(GeoUnit {
        sumlev: "140",
        geoid: format!("1400000US{fips}001000100"),
        county: "001".into(),
        tract: "000100".into(),
        name: "Census Tract 1".into(),
        logrecno: counties as i64 + 2,
    });
    units
}

fn line(kind: FragmentKind, abbr: &str, fips: &str, unit: &GeoUnit) -> String {
    let pop = 500 + unit.logrecno * 11;
    schema_for(kind)
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| match (kind, field.name()) {
            (_, "FILEID") => "PLST".to_string(),
            (_, "STUSAB") => abbr.to_string(),
            (_, "LOGRECNO") => unit.logrecno.to_string(),
            (FragmentKind::Geo, "SUMLEV") => unit.sumlev.to_string(),
            (FragmentKind::Geo, "GEOID") => unit.geoid.clone(),
            (FragmentKind::Geo, "STATE") => fips.to_string(),
            (FragmentKind::Geo, "COUNTY") => unit.county.clone(),
            (FragmentKind::Geo, "TRACT") => unit.tract.clone(),
            (FragmentKind::Geo, "NAME") => unit.name.clone(),
            (FragmentKind::Geo, "POP100") => pop.to_string(),
            (FragmentKind::Geo, _) => String::new(),
            (_, "CHARITER") => "000".to_string(),
            (_, "CIFSN") => format!("{:02}", kind as usize),
            (_, name) if name.ends_with("0001") => pop.to_string(),
            _ => (idx % 7).to_string(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn entry_name(abbr: &str, kind: FragmentKind) -> String {
    let stem = abbr.to_ascii_lowercase();
    match kind {
        FragmentKind::Geo => format!("{stem}geo2020.pl"),
        _ => format!("{stem}0000{}", kind.archive_suffix()),
    }
}

/// Bytes of a `<abbr>2020.pl.zip` archive with `counties` county rows.
pub fn archive_bytes(abbr: &str, fips: &str, counties: usize) -> TestResult<Vec<u8>> {
    let units = units(fips, counties);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for kind in FragmentKind::ALL {
        writer.start_file(entry_name(abbr, kind), options)?;
        for unit in &units {
            let text = line(kind, abbr, fips, unit);
            let encoded = TextEncoding::Latin1
                .encode(&text)
                .ok_or("fixture text is not Latin-1")?;
            writer.write_all(&encoded)?;
            writer.write_all(b"\r\n")?;
        }
    }
    Ok(writer.finish()?.into_inner())
}

/// Write an archive into `dir` under its published file name.
pub fn write_archive(dir: &Path, abbr: &str, fips: &str, counties: usize) -> TestResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}2020.pl.zip", abbr.to_ascii_lowercase()));
    std::fs::write(&path, archive_bytes(abbr, fips, counties)?)?;
    Ok(path)
}

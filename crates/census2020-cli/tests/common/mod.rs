#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use census2020_core::schema::{FragmentKind, TextEncoding, schema_for};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// One pipe-delimited record per geography: the state (`LOGRECNO` 1) and then
/// `counties` counties.
fn records(kind: FragmentKind, abbr: &str, fips: &str, counties: usize) -> Vec<String> {
    (0..=counties)
        .map(|n| {
            let logrecno = n + 1;
            let county = if n == 0 { String::new() } else { format!("{:03}", 2 * n - 1) };
            let (sumlev, geoid, name) = if n == 0 {
                ("040", format!("0400000US{fips}"), format!("State {abbr}"))
            } else {
                (
                    "050",
                    format!("0500000US{fips}{county}"),
                    format!("Condado Ñ{county}"),
                )
            };

            schema_for(kind)
                .fields()
                .iter()
                .map(|field| match (kind, field.name()) {
                    (_, "FILEID") => "PLST".to_string(),
                    (_, "STUSAB") => abbr.to_string(),
                    (_, "LOGRECNO") => logrecno.to_string(),
                    (_, "CHARITER") => "000".to_string(),
                    (_, "CIFSN") => format!("{:02}", kind as usize),
                    (FragmentKind::Geo, "SUMLEV") => sumlev.to_string(),
                    (FragmentKind::Geo, "GEOID") => geoid.clone(),
                    (FragmentKind::Geo, "STATE") => fips.to_string(),
                    (FragmentKind::Geo, "COUNTY") => county.clone(),
                    (FragmentKind::Geo, "NAME") => name.clone(),
                    (FragmentKind::Geo, _) => String::new(),
                    _ => (100 * logrecno).to_string(),
                })
                .collect::<Vec<_>>()
                .join("|")
        })
        .collect()
}

fn entry_name(abbr: &str, kind: FragmentKind) -> String {
    let stem = abbr.to_ascii_lowercase();
    match kind {
        FragmentKind::Geo => format!("{stem}geo2020.pl"),
        _ => format!("{stem}0000{}", kind.archive_suffix()),
    }
}

/// Write `<dir>/<abbr>2020.pl.zip` holding a state row and `counties` county rows.
pub fn write_archive(dir: &Path, abbr: &str, fips: &str, counties: usize) -> TestResult<PathBuf> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for kind in FragmentKind::ALL {
        writer.start_file(entry_name(abbr, kind), options)?;
        for record in records(kind, abbr, fips, counties) {
            let encoded = TextEncoding::Latin1
                .encode(&record)
                .ok_or("fixture text is not Latin-1")?;
            writer.write_all(&encoded)?;
            writer.write_all(b"\n")?;
        }
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}2020.pl.zip", abbr.to_ascii_lowercase()));
    std::fs::write(&path, writer.finish()?.into_inner())?;
    Ok(path)
}

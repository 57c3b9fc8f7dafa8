//! Locate the four fragment files inside a jurisdiction's zip archive.
//!
//! Archives are published as `<abbr>2020.pl.zip` and contain one file per
//! fragment kind, told apart only by file-name suffix (`wygeo2020.pl`,
//! `wy000012020.pl`, ...). Entries may sit inside directories; only the
//! final path component is matched.

use std::{
    collections::BTreeMap,
    io::{Cursor, Read},
};

use snafu::prelude::*;
use zip::{ZipArchive, result::ZipError};

use crate::schema::FragmentKind;

/// Errors while unpacking an archive.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArchiveError {
    /// The bytes are not a readable zip archive.
    #[snafu(display("Invalid archive: {source}"))]
    Zip {
        /// Underlying zip error.
        source: ZipError,
    },

    /// Reading an archive entry failed.
    #[snafu(display("Failed to read archive entry {name}: {source}"))]
    ReadEntry {
        /// Entry name inside the archive.
        name: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// No entry matched a fragment kind's suffix.
    #[snafu(display("Archive has no {kind} fragment (expected a file ending in {suffix})"))]
    MissingFragment {
        /// Fragment kind that was not found.
        kind: FragmentKind,
        /// Suffix that was searched for.
        suffix: &'static str,
    },

    /// More than one entry matched a fragment kind's suffix.
    #[snafu(display("Archive has more than one {kind} fragment: {names:?}"))]
    AmbiguousFragment {
        /// Fragment kind with several candidates.
        kind: FragmentKind,
        /// Names of the matching entries.
        names: Vec<String>,
    },
}

/// Raw bytes of the four fragments of one jurisdiction.
#[derive(Debug, Clone, Default)]
pub struct FragmentFiles {
    /// Geographic header.
    pub geo: Vec<u8>,
    /// Count fragment 1.
    pub part1: Vec<u8>,
    /// Count fragment 2.
    pub part2: Vec<u8>,
    /// Count fragment 3.
    pub part3: Vec<u8>,
}

impl FragmentFiles {
    /// Bytes of one fragment.
    pub fn get(&self, kind: FragmentKind) -> &[u8] {
        match kind {
            FragmentKind::Geo => &self.geo,
            FragmentKind::Part1 => &self.part1,
            FragmentKind::Part2 => &self.part2,
            FragmentKind::Part3 => &self.part3,
        }
    }

    fn slot(&mut self, kind: FragmentKind) -> &mut Vec<u8> {
        match kind {
            FragmentKind::Geo => &mut self.geo,
            FragmentKind::Part1 => &mut self.part1,
            FragmentKind::Part2 => &mut self.part2,
            FragmentKind::Part3 => &mut self.part3,
        }
    }
}

/// Which fragment, if any, an entry name belongs to.
///
/// `geo2020.pl` is tested first; no count suffix can end a geo file name,
/// but the explicit order keeps the match unambiguous.
pub fn classify_entry(name: &str) -> Option<FragmentKind> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    FragmentKind::ALL
        .into_iter()
        .find(|kind| file_name.ends_with(kind.archive_suffix()))
}

/// Extract the four fragments from in-memory zip bytes.
pub fn unpack_archive(bytes: &[u8]) -> Result<FragmentFiles, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context(ZipSnafu)?;

    let mut matches: BTreeMap<FragmentKind, Vec<usize>> = BTreeMap::new();
    let mut names = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let entry = archive.by_index(idx).context(ZipSnafu)?;
        let name = entry.name().to_string();
        if !entry.is_dir()
            && let Some(kind) = classify_entry(&name)
        {
            matches.entry(kind).or_default().push(idx);
        }
        names.push(name);
    }

    let mut files = FragmentFiles::default();
    for kind in FragmentKind::ALL {
        let idx = match matches.get(&kind).map(Vec::as_slice) {
            None | Some([]) => {
                return MissingFragmentSnafu {
                    kind,
                    suffix: kind.archive_suffix(),
                }
                .fail();
            }
            Some([idx]) => *idx,
            Some(many) => {
                return AmbiguousFragmentSnafu {
                    kind,
                    names: many.iter().map(|&i| names[i].clone()).collect::<Vec<_>>(),
                }
                .fail();
            }
        };

        let mut entry = archive.by_index(idx).context(ZipSnafu)?;
        let slot = files.slot(kind);
        slot.reserve(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(slot).context(ReadEntrySnafu {
            name: names[idx].clone(),
        })?;
    }

    Ok(files)
}

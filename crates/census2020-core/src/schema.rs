//! Schema registry for the four fragment kinds of a jurisdiction extract.
//!
//! Every jurisdiction archive carries one geographic header and three count
//! fragments. Each is a headerless, `|`-delimited, Latin-1 encoded text file
//! whose columns are identified only by position, so the registry is the
//! single source of truth for column names and types.
//!
//! The registry is built once on first use and is immutable afterwards.

mod catalog;

use std::{
    borrow::Cow,
    fmt,
    str::FromStr,
    sync::{Arc, LazyLock},
};

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use snafu::prelude::*;

use catalog::{
    COUNT_PREFIX_FIELDS, CountTable, GEO_FIELDS, PART1_TABLES, PART2_TABLES, PART3_TABLES,
};

/// Name of the per-record identifier linking rows across fragments.
pub const JOIN_KEY: &str = "LOGRECNO";

/// Column carrying the geographic summary level of a row.
pub const SUMMARY_LEVEL_COLUMN: &str = "SUMLEV";

/// Column carrying the jurisdiction's postal code.
pub const STUSAB_COLUMN: &str = "STUSAB";

/// Column carrying the full geographic identifier of a row.
pub const GEO_ID_COLUMN: &str = "GEOID";

/// Metadata columns present in every fragment; only the geographic header's
/// copies survive a combine.
pub const ADMINISTRATIVE_COLUMNS: [&str; 5] =
    ["LOGRECNO", "STUSAB", "FILEID", "CHARITER", "CIFSN"];

/// Errors from schema lookups.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SchemaError {
    /// The requested fragment kind is not one of `geo`, `part1`, `part2`, `part3`.
    #[snafu(display("Unknown fragment kind: {kind}"))]
    UnknownFragmentKind {
        /// The kind string supplied by the caller.
        kind: String,
    },
}

/// Semantic type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Identifier or code, kept verbatim (leading zeros are significant).
    Text,
    /// Signed 64-bit count; an empty field is null, not zero.
    Int64,
}

impl FieldType {
    /// Arrow type used to materialize columns of this field type.
    pub fn arrow_type(self) -> DataType {
        match self {
            FieldType::Text => DataType::Utf8,
            FieldType::Int64 => DataType::Int64,
        }
    }
}

/// Single-byte text encodings a fragment may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1: byte `b` decodes to the code point `U+00bb`.
    Latin1,
}

impl TextEncoding {
    /// Decode `bytes` into a `String` without any lossy replacement.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Inverse of [`TextEncoding::decode`]; returns `None` if `text` holds a
    /// character outside the encoding's range.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            TextEncoding::Latin1 => text.chars().map(|c| u8::try_from(c).ok()).collect(),
        }
    }
}

/// The four fragment kinds of a jurisdiction extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentKind {
    /// Geographic header.
    Geo,
    /// Count fragment 1 (tables P1, P2).
    Part1,
    /// Count fragment 2 (tables P3, P4, H1).
    Part2,
    /// Count fragment 3 (table P5).
    Part3,
}

impl FragmentKind {
    /// All kinds, in combine order.
    pub const ALL: [FragmentKind; 4] = [
        FragmentKind::Geo,
        FragmentKind::Part1,
        FragmentKind::Part2,
        FragmentKind::Part3,
    ];

    /// Lower-case name used in messages and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentKind::Geo => "geo",
            FragmentKind::Part1 => "part1",
            FragmentKind::Part2 => "part2",
            FragmentKind::Part3 => "part3",
        }
    }

    /// File-name suffix identifying this fragment inside an archive.
    pub fn archive_suffix(self) -> &'static str {
        match self {
            FragmentKind::Geo => "geo2020.pl",
            FragmentKind::Part1 => "12020.pl",
            FragmentKind::Part2 => "22020.pl",
            FragmentKind::Part3 => "32020.pl",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FragmentKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .context(UnknownFragmentKindSnafu { kind: s })
    }
}

/// One positional field of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Column name, unique within its fragment.
    pub name: Cow<'static, str>,
    /// Semantic type the raw text is coerced to.
    pub field_type: FieldType,
}

/// Full description of one fragment file layout.
#[derive(Debug, Clone)]
pub struct FragmentSchema {
    kind: FragmentKind,
    delimiter: u8,
    encoding: TextEncoding,
    fields: Vec<FieldSchema>,
    arrow: SchemaRef,
}

impl FieldSchema {
    /// Column name as a `&str`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FragmentSchema {
    fn new(kind: FragmentKind, fields: Vec<FieldSchema>) -> Self {
        let arrow = Arc::new(Schema::new(
            fields
                .iter()
                .map(|f| Field::new(f.name(), f.field_type.arrow_type(), true))
                .collect::<Vec<_>>(),
        ));

        Self {
            kind,
            delimiter: b'|',
            encoding: TextEncoding::Latin1,
            fields,
            arrow,
        }
    }

    /// Fragment kind this schema describes.
    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Field delimiter byte.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Text encoding of the raw file.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Fields in file order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Number of fields each record must have.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of `name`, if the fragment declares it.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Arrow schema of the parsed table (all columns nullable).
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::clone(&self.arrow)
    }
}

fn expand_fixed(fields: &[(&'static str, FieldType)]) -> Vec<FieldSchema> {
    fields
        .iter()
        .map(|&(name, field_type)| FieldSchema {
            name: Cow::Borrowed(name),
            field_type,
        })
        .collect()
}

fn expand_counts(tables: &[CountTable]) -> Vec<FieldSchema> {
    let mut out = expand_fixed(COUNT_PREFIX_FIELDS);
    for t in tables {
        for cell in 1..=t.cells {
            out.push(FieldSchema {
                name: Cow::Owned(format!("{}{cell:04}", t.id)),
                field_type: FieldType::Int64,
            });
        }
    }
    out
}

struct SchemaRegistry {
    geo: FragmentSchema,
    part1: FragmentSchema,
    part2: FragmentSchema,
    part3: FragmentSchema,
}

static REGISTRY: LazyLock<SchemaRegistry> = LazyLock::new(|| SchemaRegistry {
    geo: FragmentSchema::new(FragmentKind::Geo, expand_fixed(GEO_FIELDS)),
    part1: FragmentSchema::new(FragmentKind::Part1, expand_counts(PART1_TABLES)),
    part2: FragmentSchema::new(FragmentKind::Part2, expand_counts(PART2_TABLES)),
    part3: FragmentSchema::new(FragmentKind::Part3, expand_counts(PART3_TABLES)),
});

/// Schema for a fragment kind.
pub fn schema_for(kind: FragmentKind) -> &'static FragmentSchema {
    let registry = &*REGISTRY;
    match kind {
        FragmentKind::Geo => &registry.geo,
        FragmentKind::Part1 => &registry.part1,
        FragmentKind::Part2 => &registry.part2,
        FragmentKind::Part3 => &registry.part3,
    }
}

/// Schema lookup for string-typed callers (`"geo"`, `"part1"`, ...).
pub fn schema_for_name(kind: &str) -> Result<&'static FragmentSchema, SchemaError> {
    kind.parse::<FragmentKind>().map(schema_for)
}

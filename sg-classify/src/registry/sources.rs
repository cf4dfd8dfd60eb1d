//! Name/gender source file loaders
//!
//! Each loader turns a tabular file into an ordered list of `NameRecord`s.
//! Rows that cannot be decoded are skipped and counted; a file that cannot be
//! opened, or yields no usable row at all, is `SourceUnavailable`.

use super::{NameRecord, NameSource};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sg_common::config::{SourceConfig, SourceFormat};
use sg_common::{Error, Gender, Result};
use std::io::Read;
use tracing::{debug, info, warn};

/// INSEE national first-name file row (`sexe;preusuel;annais;nombre`)
#[derive(Debug, Deserialize)]
struct InseeRow {
    sexe: u8,
    preusuel: String,
    nombre: u64,
}

/// NRS Scotland baby names row (`yr,sex,FirstForename,number,...`)
#[derive(Debug, Deserialize)]
struct NrsRow {
    sex: String,
    #[serde(rename = "FirstForename")]
    first_forename: String,
    number: u64,
}

/// Curated list row (`name,gender`)
#[derive(Debug, Deserialize)]
struct CuratedRow {
    name: String,
    gender: String,
}

/// Load a configured source from disk
pub fn load_source(config: &SourceConfig) -> Result<NameSource> {
    let file = std::fs::File::open(&config.path).map_err(|e| {
        Error::source_unavailable(
            &config.label,
            format!("cannot open {}: {}", config.path.display(), e),
        )
    })?;

    let source = read_source(&config.label, config.format, config.min_frequency, file)?
        .with_duplicates(config.duplicate_policy());

    info!(
        source = %config.label,
        path = %config.path.display(),
        records = source.records.len(),
        skipped = source.skipped_rows,
        "Name source loaded"
    );

    Ok(source)
}

/// Decode a source from any reader
pub fn read_source<R: Read>(
    label: &str,
    format: SourceFormat,
    min_frequency: Option<u64>,
    reader: R,
) -> Result<NameSource> {
    let delimiter = match format {
        SourceFormat::Insee => b';',
        SourceFormat::Nrs | SourceFormat::Curated => b',',
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let (records, skipped_rows) = match format {
        SourceFormat::Insee => collect_rows(label, &mut csv_reader, |row: InseeRow| {
            let gender = Gender::from_code(row.sexe)
                .ok_or_else(|| format!("unknown sexe code {}", row.sexe))?;
            Ok(NameRecord::new(row.preusuel, gender, Some(row.nombre)))
        }),
        SourceFormat::Nrs => collect_rows(label, &mut csv_reader, |row: NrsRow| {
            let gender = match row.sex.as_str() {
                "B" | "b" => Gender::Masculine,
                "G" | "g" => Gender::Feminine,
                other => return Err(format!("unknown sex '{}'", other)),
            };
            Ok(NameRecord::new(row.first_forename, gender, Some(row.number)))
        }),
        SourceFormat::Curated => collect_rows(label, &mut csv_reader, |row: CuratedRow| {
            let gender = row.gender.parse::<Gender>().map_err(|e| e.to_string())?;
            Ok(NameRecord::new(row.name, gender, None))
        }),
    };

    if records.is_empty() {
        return Err(Error::source_unavailable(
            label,
            format!("no usable rows ({} skipped)", skipped_rows),
        ));
    }

    if skipped_rows > 0 {
        warn!(source = label, skipped = skipped_rows, "Some source rows could not be decoded");
    }

    Ok(NameSource {
        label: label.to_string(),
        min_frequency,
        records,
        duplicates: format.default_duplicates(),
        skipped_rows,
    })
}

/// Deserialize every row, converting the good ones and counting the rest
fn collect_rows<R, T, F>(
    label: &str,
    csv_reader: &mut csv::Reader<R>,
    convert: F,
) -> (Vec<NameRecord>, usize)
where
    R: Read,
    T: DeserializeOwned,
    F: Fn(T) -> std::result::Result<NameRecord, String>,
{
    let mut records = Vec::new();
    let mut skipped_rows = 0usize;

    for row in csv_reader.deserialize::<T>() {
        match row.map_err(|e| e.to_string()).and_then(&convert) {
            Ok(record) => records.push(record),
            Err(reason) => {
                debug!(source = label, reason = %reason, "Skipping source row");
                skipped_rows += 1;
            }
        }
    }

    (records, skipped_rows)
}

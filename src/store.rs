// src/store.rs
//! Dataset files: raw collector dumps in, canonical datasets out.
//!
//! Readers accept JSON (array of objects) or CSV with a header row, trying
//! JSON first. Writers pick the format from the extension (`.json`, else
//! CSV) and replace the target atomically.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::reconcile::canonical_from_raw;
use crate::types::{CanonicalMention, RawMention, SkipTally, CANONICAL_COLUMNS};

const BOM: char = '\u{feff}';

/// Parse a JSON array of objects. Non-object elements are ignored.
pub fn parse_records_json(s: &str) -> Result<Vec<RawMention>> {
    let v: Value = serde_json::from_str(s).context("invalid JSON")?;
    let Value::Array(items) = v else {
        bail!("expected a JSON array of records");
    };
    Ok(items
        .into_iter()
        .filter(|it| it.is_object())
        .map(RawMention::from_json)
        .collect())
}

/// Parse CSV with a header row. Empty cells become `Null`; repeated header
/// names are kept as separate columns. A UTF-8 BOM before the header is ignored.
pub fn parse_records_csv<R: Read>(reader: R) -> Result<Vec<RawMention>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .enumerate()
        .map(|(i, h)| match i {
            0 => h.trim_start_matches(BOM).to_string(),
            _ => h.to_string(),
        })
        .collect();
    let mut out = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("reading CSV row {}", i + 1))?;
        let pairs = headers.iter().zip(row.iter()).map(|(h, cell)| {
            let v = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            (h.clone(), v)
        });
        out.push(RawMention::from_pairs(pairs));
    }
    Ok(out)
}

/// Parse file content as JSON, falling back to CSV.
pub fn parse_records(content: &str) -> Result<Vec<RawMention>> {
    let content = content.trim_start_matches(BOM);
    let looks_json = matches!(content.trim_start().chars().next(), Some('[') | Some('{'));
    if looks_json {
        match parse_records_json(content) {
            Ok(v) => return Ok(v),
            Err(e) => tracing::debug!(target: "store", error = %e, "not JSON, trying CSV"),
        }
    }
    parse_records_csv(content.as_bytes()).context("parsing as CSV")
}

pub fn load_records(path: &Path) -> Result<Vec<RawMention>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let recs = parse_records(&content).with_context(|| format!("loading {}", path.display()))?;
    tracing::debug!(target: "store", path = %path.display(), rows = recs.len(), "loaded records");
    Ok(recs)
}

/// Load a persisted canonical dataset. Unreadable rows are skipped and tallied.
pub fn load_canonical(path: &Path) -> Result<(Vec<CanonicalMention>, SkipTally)> {
    let raw = load_records(path)?;
    let mut tally = SkipTally::default();
    let mut out = Vec::with_capacity(raw.len());
    for r in &raw {
        match canonical_from_raw(r) {
            Ok(m) => out.push(m),
            Err(reason) => tally.record(reason),
        }
    }
    if tally.total() > 0 {
        tracing::info!(
            target: "store",
            path = %path.display(),
            loaded = out.len(),
            skipped = tally.total(),
            "dataset rows skipped on load"
        );
    }
    Ok((out, tally))
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        write(&mut w)?;
        w.flush()?;
    }
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[CanonicalMention]) -> Result<()> {
    write_atomically(path, |w| {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(CANONICAL_COLUMNS)?;
        for m in records {
            let sentiment = m.sentiment().map(|s| s.as_str()).unwrap_or_default();
            let compound = if m.is_scored() {
                m.compound().to_string()
            } else {
                String::new()
            };
            let analyzed_at = m.analyzed_at.as_ref().map(rfc3339).unwrap_or_default();
            wtr.write_record([
                m.platform.as_str(),
                m.source.as_str(),
                m.text.as_str(),
                rfc3339(&m.date).as_str(),
                m.url.as_deref().unwrap_or_default(),
                sentiment,
                compound.as_str(),
                analyzed_at.as_str(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    })
    .with_context(|| format!("writing CSV dataset {}", path.display()))
}

pub fn write_json(path: &Path, records: &[CanonicalMention]) -> Result<()> {
    write_atomically(path, |w| {
        serde_json::to_writer_pretty(&mut *w, records)?;
        w.write_all(b"\n")?;
        Ok(())
    })
    .with_context(|| format!("writing JSON dataset {}", path.display()))
}

/// Write collector output as CSV. The header is the union of all columns in
/// first-seen order; a column repeated within a record keeps its last value.
pub fn write_raw_csv(path: &Path, records: &[RawMention]) -> Result<()> {
    let mut header: Vec<&str> = Vec::new();
    for r in records {
        for (col, _) in r.fields() {
            if !header.contains(&col.as_str()) {
                header.push(col.as_str());
            }
        }
    }
    write_atomically(path, |w| {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(&header)?;
        for r in records {
            let row = header.iter().map(|col| {
                r.fields()
                    .iter()
                    .rev()
                    .find(|(k, _)| k.as_str() == *col)
                    .map(|(_, v)| cell(v))
                    .unwrap_or_default()
            });
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    })
    .with_context(|| format!("writing raw records {}", path.display()))
}

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write by extension: `.json` → JSON array, anything else → CSV.
pub fn write_dataset(path: &Path, records: &[CanonicalMention]) -> Result<()> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        write_json(path, records)
    } else {
        write_csv(path, records)
    }
}

use anyhow::{Context, Result};
use knap_structs::core::{ResultRecord, HEADER};
use log::warn;
use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Instance ids that already have a complete row in the log at `path`. A missing log has none.
/// Rows that do not parse, such as one cut off by a killed run, are not counted, so those
/// instances run again.
pub fn load_completed(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    Ok(read_records(path)?
        .into_iter()
        .map(|record| record.instance)
        .collect())
}

/// Every parseable row of the log at `path`, in file order. Malformed rows are skipped.
pub fn read_records(path: &Path) -> Result<Vec<ResultRecord>> {
    let mut records = Vec::new();
    for (row, record) in reader(path)?.records().enumerate() {
        let record = record.with_context(|| format!("could not read log: {}", path.display()))?;
        if record.get(0) == Some(HEADER[0]) {
            continue;
        }
        let fields: Vec<&str> = record.iter().collect();
        match ResultRecord::from_row(&fields) {
            Ok(result) => records.push(result),
            Err(e) => warn!("{}: skipping row {}: {}", path.display(), row + 1, e),
        }
    }
    Ok(records)
}

fn reader(path: &Path) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("could not open log: {}", path.display()))
}

/// Append-only CSV log. Each record is flushed as soon as it is written.
pub struct ResultLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ResultLog {
    /// Opens `path` for appending, creating it with a header row if it is missing or empty.
    pub fn open_append(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create dir: {}", parent.display()))?;
        }
        let needs_newline = ends_mid_line(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("could not open log: {}", path.display()))?;
        let is_empty = file.metadata()?.len() == 0;
        if needs_newline {
            // A previous run stopped mid-row; keep the next row on its own line
            file.write_all(b"\n")?;
        }

        let mut log = Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(file),
        };
        if is_empty {
            log.write_row(&HEADER)?;
        }
        Ok(log)
    }

    pub fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.write_row(&record.to_row())
    }

    fn write_row<S: AsRef<[u8]>>(&mut self, row: &[S]) -> Result<()> {
        self.writer
            .write_record(row)
            .and_then(|_| self.writer.flush().map_err(csv::Error::from))
            .with_context(|| format!("could not write to log: {}", self.path.display()))
    }
}

fn ends_mid_line(path: &Path) -> Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Ok(false),
    };
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

use super::{Challenge, Item};
use anyhow::{anyhow, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const ITEMS_SUFFIX: &str = "_items.csv";
pub const INFO_SUFFIX: &str = "_info.csv";
pub const TEXT_EXTENSION: &str = "txt";

/// On-disk layout of a single instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceSource {
    /// `<stem>_info.csv` holding the capacity and `<stem>_items.csv` holding the items.
    CsvPair { info: PathBuf, items: PathBuf },
    /// Raw low-dimensional text: `n capacity` followed by `n` lines of `value weight`.
    Text(PathBuf),
}

impl InstanceSource {
    /// Resolves the source from any one of its files.
    pub fn detect(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("Invalid instance path: {}", path.display()))?;

        let stem = file_name
            .strip_suffix(ITEMS_SUFFIX)
            .or_else(|| file_name.strip_suffix(INFO_SUFFIX));
        if let Some(stem) = stem {
            let folder = path.parent().unwrap_or_else(|| Path::new(""));
            return Ok(InstanceSource::CsvPair {
                info: folder.join(format!("{}{}", stem, INFO_SUFFIX)),
                items: folder.join(format!("{}{}", stem, ITEMS_SUFFIX)),
            });
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(TEXT_EXTENSION) => Ok(InstanceSource::Text(path.to_path_buf())),
            _ => Err(anyhow!("Unrecognised instance file: {}", path.display())),
        }
    }
}

/// Identifier of the instance stored at `path`: the file name without the
/// `_items.csv`/`_info.csv` suffix or the extension.
pub fn instance_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    for suffix in [ITEMS_SUFFIX, INFO_SUFFIX, ".csv", ".txt"] {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return stem.to_string();
        }
    }
    file_name
}

impl Challenge {
    pub fn load(path: &Path) -> Result<Self> {
        match InstanceSource::detect(path)? {
            InstanceSource::CsvPair { info, items } => Self::load_csv_pair(&info, &items),
            InstanceSource::Text(path) => Self::load_text(&path),
        }
    }

    pub fn load_csv_pair(info: &Path, items: &Path) -> Result<Self> {
        let max_weight = read_capacity(info)?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(items)
            .with_context(|| format!("could not open items file: {}", items.display()))?;

        // Named columns win; otherwise rows are `id,value,weight,...`
        let headers = reader.headers()?.clone();
        let column = |name: &str, fallback: usize| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .unwrap_or(fallback)
        };
        let value_column = column("value", 1);
        let weight_column = column("weight", 2);

        let mut parsed = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("{}: malformed row {}", items.display(), row + 2))?;
            let field = |column: usize, name: &str| -> Result<u32> {
                let raw = record.get(column).ok_or_else(|| {
                    anyhow!("{}: row {} has no {} column", items.display(), row + 2, name)
                })?;
                raw.parse::<u32>().with_context(|| {
                    format!("{}: row {} has invalid {} '{}'", items.display(), row + 2, name, raw)
                })
            };
            parsed.push(Item::new(
                field(weight_column, "weight")?,
                field(value_column, "value")?,
            ));
        }
        Ok(Challenge::new(&parsed, max_weight))
    }

    pub fn load_text(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("could not read instance file: {}", path.display()))?;
        Self::parse_text(&contents).with_context(|| format!("{}", path.display()))
    }

    /// Parses the low-dimensional text format. Lines after the `n` items are ignored.
    pub fn parse_text(contents: &str) -> Result<Self> {
        let mut lines = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let header = lines.next().ok_or_else(|| anyhow!("Empty instance"))?;
        let (num_items, max_weight) = parse_pair(header)?;
        let num_items = num_items as usize;

        let mut items = Vec::with_capacity(num_items);
        for line in lines.take(num_items) {
            let (value, weight) = parse_pair(line)?;
            items.push(Item::new(weight, value));
        }
        if items.len() != num_items {
            return Err(anyhow!(
                "Expected {} items but found {}",
                num_items,
                items.len()
            ));
        }
        Ok(Challenge::new(&items, max_weight))
    }
}

fn read_capacity(info: &Path) -> Result<u32> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(info)
        .with_context(|| format!("could not open info file: {}", info.display()))?;
    let record = reader
        .records()
        .next()
        .ok_or_else(|| anyhow!("{} is empty", info.display()))?
        .with_context(|| format!("{}: malformed capacity row", info.display()))?;
    let raw = record
        .get(1)
        .ok_or_else(|| anyhow!("{}: capacity row has no value", info.display()))?;
    raw.parse::<u32>()
        .with_context(|| format!("{}: invalid capacity '{}'", info.display(), raw))
}

fn parse_pair(line: &str) -> Result<(u32, u32)> {
    let mut fields = line.split_whitespace();
    let mut next = || -> Result<u32> {
        let raw = fields
            .next()
            .ok_or_else(|| anyhow!("Expected two integers in line '{}'", line))?;
        // Some corpora write integral values as floats
        raw.parse::<u32>()
            .or_else(|_| match raw.parse::<f64>() {
                Ok(v) if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
                _ => Err(anyhow!("Invalid integer '{}' in line '{}'", raw, line)),
            })
    };
    Ok((next()?, next()?))
}

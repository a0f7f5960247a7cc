use super::InstanceFile;
use anyhow::{Context, Result};
use knap_challenges::knapsack::{instance_name, INFO_SUFFIX, ITEMS_SUFFIX, TEXT_EXTENSION};
use log::warn;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Every instance below `data_dirs`, one per id, ordered by path.
///
/// A CSV pair is represented by its `_items.csv` file. Directories that do not
/// exist are skipped with a warning.
pub fn execute(data_dirs: &[PathBuf]) -> Result<Vec<InstanceFile>> {
    let mut paths = Vec::new();
    for dir in data_dirs {
        if !dir.is_dir() {
            warn!("data dir {} does not exist, skipping", dir.display());
            continue;
        }
        walk(dir, &mut paths)?;
    }
    paths.sort();
    paths.dedup();

    let mut by_id: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in paths {
        let id = instance_name(&path);
        if let Some(existing) = by_id.get(&id) {
            warn!(
                "instance id {} appears at {} and {}, keeping the first",
                id,
                existing.display(),
                path.display()
            );
            continue;
        }
        by_id.insert(id, path);
    }

    let mut instances: Vec<InstanceFile> = by_id
        .into_iter()
        .map(|(id, path)| InstanceFile { id, path })
        .collect();
    instances.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(instances)
}

fn walk(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("could not read dir: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, paths)?;
        } else if is_instance_file(&path) {
            paths.push(path);
        }
    }
    Ok(())
}

fn is_instance_file(path: &Path) -> bool {
    let file_name = match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if file_name.ends_with(INFO_SUFFIX) {
        return false;
    }
    file_name.ends_with(ITEMS_SUFFIX)
        || path.extension().and_then(|ext| ext.to_str()) == Some(TEXT_EXTENSION)
}

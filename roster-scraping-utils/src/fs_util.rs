use std::{fmt::Debug, path::Path, path::PathBuf};

use anyhow::Context;
use fs_err::File;
use serde::Deserialize;

pub fn read_toml<P: Into<PathBuf> + Debug, T: for<'de> Deserialize<'de>>(
    path: P,
) -> anyhow::Result<T> {
    let path = path.into();
    (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))().with_context(
        || {
            format!(
                "While trying to parse {path:?} as {}",
                std::any::type_name::<T>()
            )
        },
    )
}

/// Reads every row of a headed CSV file as `T`.
pub fn read_csv<P: Into<PathBuf> + Debug, T: for<'de> Deserialize<'de>>(
    path: P,
) -> anyhow::Result<Vec<T>> {
    let path = path.into();
    (|| {
        csv::Reader::from_reader(File::open(&path)?)
            .into_deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(anyhow::Error::new)
    })()
    .with_context(|| {
        format!(
            "While trying to read {path:?} as rows of {}",
            std::any::type_name::<T>()
        )
    })
}

/// Creates the parent directory of `path` if it has one.
pub fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs_err::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

/// Whether `path` is missing or has no bytes yet, i.e. a CSV header still has to be written.
pub fn is_missing_or_empty(path: &Path) -> anyhow::Result<bool> {
    match fs_err::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

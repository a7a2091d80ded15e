use std::path::{Path, PathBuf};

use anyhow::bail;
use log::info;

use crate::table::{read_table, write_table};

/// Concatenates the raw tables `inputs` into one table at `output`, in the given order.
///
/// Every input is read leniently, so older layouts end up in the canonical columns.
pub fn consolidate(inputs: &[PathBuf], output: &Path) -> anyhow::Result<usize> {
    if let Some(missing) = inputs.iter().find(|path| !path.exists()) {
        bail!("Input table {missing:?} does not exist");
    }
    let mut rows = vec![];
    for input in inputs {
        let table = read_table(input)?;
        info!("{} rows read from {input:?}", table.len());
        rows.extend(table);
    }
    let written = write_table(output, &rows)?;
    info!("{written} rows written to {output:?}");
    Ok(written)
}

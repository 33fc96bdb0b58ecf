// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File preparation shared by the file-backed backends.

use std::path::Path;

use mrtooley_core::MrTooleyError;

/// What to do when the backing file or its folders do not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub create_missing: bool,
    pub create_parents: bool,
}

impl OpenOptions {
    /// Create the file and any missing parent folders.
    pub fn create() -> Self {
        Self {
            create_missing: true,
            create_parents: true,
        }
    }
}

/// Checks `path` against `options`, creating parents if allowed.
///
/// Returns whether the file already existed.
pub(crate) async fn prepare_file(
    path: &Path,
    options: OpenOptions,
    kind: &str,
) -> Result<bool, MrTooleyError> {
    if tokio::fs::try_exists(path).await? {
        return Ok(true);
    }
    if !options.create_missing {
        return Err(MrTooleyError::storage(format!(
            "{kind} file missing: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        && !tokio::fs::try_exists(parent).await?
    {
        if !options.create_parents {
            return Err(MrTooleyError::storage(format!(
                "Parent folders missing: {}",
                parent.display()
            )));
        }
        create_private_dirs(parent).await?;
    }
    Ok(false)
}

#[cfg(unix)]
async fn create_private_dirs(dir: &Path) -> Result<(), MrTooleyError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true).mode(0o700);
    builder.create(dir).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn create_private_dirs(dir: &Path) -> Result<(), MrTooleyError> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

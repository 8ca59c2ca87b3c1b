use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::args::CommandConfig;
use crate::delete::{DeleteError, Deleter};

/// Prefix of the line printed for every deleted entry.
pub const DELETED_MARKER: &str = "[x]";

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("could not perform operation: {message}. path: {}", path.display())]
    Enumerate {
        path: PathBuf,
        message: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("could not perform operation: {source}. path: {}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: DeleteError,
    },

    #[error("could not write output: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub visited: usize,
    pub matched: usize,
    pub deleted: usize,
}

/// Whether `base_name` passes `filter`: full equality when `exact`, a
/// contiguous substring otherwise.
pub fn name_matches(base_name: &str, filter: &str, exact: bool) -> bool {
    if exact {
        base_name == filter
    } else {
        base_name.contains(filter)
    }
}

fn entry_matches(entry: &DirEntry, config: &CommandConfig) -> bool {
    match config.name() {
        Some(filter) => name_matches(&entry.file_name().to_string_lossy(), filter, config.exact()),
        None => true,
    }
}

/// Walks everything below `config.path()`, printing matches to `out` or
/// handing them to `deleter`. Stops at the first enumeration or deletion
/// failure; whatever was printed before it is flushed either way.
pub fn run_find<D, W>(
    config: &CommandConfig,
    deleter: &D,
    out: &mut W,
) -> Result<WalkSummary, WalkError>
where
    D: Deleter + ?Sized,
    W: Write,
{
    let mut summary = WalkSummary::default();
    let result = visit_all(config, deleter, out, &mut summary);
    out.flush()?;
    result.map(|()| summary)
}

fn visit_all<D, W>(
    config: &CommandConfig,
    deleter: &D,
    out: &mut W,
    summary: &mut WalkSummary,
) -> Result<(), WalkError>
where
    D: Deleter + ?Sized,
    W: Write,
{
    // Pre-order so directories the deleter owns are pruned before the walk
    // enters them.
    let walker = WalkDir::new(config.path())
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            let owned = || entry.file_type().is_dir() && deleter.is_protected(entry.path());
            !(config.delete() && owned())
        });

    // Matched directories wait here until the walk has left them, so their
    // contents are handled first. Always a chain of ancestors.
    let mut pending: Vec<DirEntry> = Vec::new();

    for entry in walker {
        let entry = entry.map_err(|err| enumerate_error(err, config))?;
        delete_left_dirs(&mut pending, entry.depth(), deleter, out, summary)?;
        summary.visited += 1;

        if !entry_matches(&entry, config) {
            continue;
        }
        summary.matched += 1;

        if !config.delete() {
            writeln!(out, "{}", entry.path().display())?;
            continue;
        }

        if entry.file_type().is_dir() {
            pending.push(entry);
        } else {
            delete_one(&entry, deleter, out, summary)?;
        }
    }

    delete_left_dirs(&mut pending, 0, deleter, out, summary)
}

/// Deletes the pending directories the walk has moved out of, i.e. those at
/// `depth` or deeper.
fn delete_left_dirs<D, W>(
    pending: &mut Vec<DirEntry>,
    depth: usize,
    deleter: &D,
    out: &mut W,
    summary: &mut WalkSummary,
) -> Result<(), WalkError>
where
    D: Deleter + ?Sized,
    W: Write,
{
    while pending.last().is_some_and(|dir| dir.depth() >= depth) {
        if let Some(dir) = pending.pop() {
            delete_one(&dir, deleter, out, summary)?;
        }
    }
    Ok(())
}

fn delete_one<D, W>(
    entry: &DirEntry,
    deleter: &D,
    out: &mut W,
    summary: &mut WalkSummary,
) -> Result<(), WalkError>
where
    D: Deleter + ?Sized,
    W: Write,
{
    deleter
        .delete_entry(entry.path())
        .map_err(|source| WalkError::Delete {
            path: entry.path().to_path_buf(),
            source,
        })?;
    summary.deleted += 1;
    writeln!(out, "{DELETED_MARKER} {}", entry.path().display())?;
    Ok(())
}

fn enumerate_error(err: walkdir::Error, config: &CommandConfig) -> WalkError {
    let path = err
        .path()
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|| config.path().as_std_path().to_path_buf());
    let message = match err.io_error() {
        Some(io) => io.to_string(),
        None => err.to_string(),
    };
    WalkError::Enumerate {
        path,
        message,
        source: err,
    }
}

//! Home trash as laid out by the freedesktop.org Trash specification.
//!
//! A trashed entry lives in `files/<name>` next to `info/<name>.trashinfo`,
//! which records where it came from and when it was deleted.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::delete::{remove_permanently, DeleteError, Deleter};

pub const TRASHINFO_EXTENSION: &str = ".trashinfo";
pub const TRASHINFO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct XdgTrash {
    home: PathBuf,
}

/// Name reserved inside the trash for one entry.
#[derive(Debug)]
struct Slot {
    file: PathBuf,
    info: PathBuf,
}

impl XdgTrash {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `$XDG_DATA_HOME/Trash`, or `$HOME/.local/share/Trash` when the former
    /// is unset or relative.
    pub fn from_env() -> Option<Self> {
        let data_home = env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
            .or_else(|| {
                env::var_os("HOME")
                    .filter(|home| !home.is_empty())
                    .map(|home| PathBuf::from(home).join(".local").join("share"))
            })?;
        Some(Self::new(data_home.join("Trash")))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn files_dir(&self) -> PathBuf {
        self.home.join("files")
    }

    pub fn info_dir(&self) -> PathBuf {
        self.home.join("info")
    }

    /// Canonical trash location, valid before the trash is first created.
    fn resolved_home(&self) -> io::Result<PathBuf> {
        resolve_existing(&self.home)
    }

    /// Reserves a free name by creating its info file exclusively.
    fn claim(&self, original: &Path, deleted_at: DateTime<Local>) -> io::Result<Slot> {
        let files_dir = self.files_dir();
        let info_dir = self.info_dir();
        fs::create_dir_all(&files_dir)?;
        fs::create_dir_all(&info_dir)?;

        let base = original
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let contents = trash_info(original, deleted_at);

        let mut attempt = 0u64;
        loop {
            let name = candidate_name(base, attempt);
            attempt += 1;

            let file = files_dir.join(&name);
            if fs::symlink_metadata(&file).is_ok() {
                continue;
            }

            let mut info_name = name;
            info_name.push(TRASHINFO_EXTENSION);
            let info = info_dir.join(info_name);

            let mut handle = match OpenOptions::new().write(true).create_new(true).open(&info) {
                Ok(handle) => handle,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            };
            if let Err(err) = handle.write_all(contents.as_bytes()) {
                let _ = fs::remove_file(&info);
                return Err(err);
            }

            return Ok(Slot { file, info });
        }
    }
}

impl Deleter for XdgTrash {
    fn delete_entry(&self, path: &Path) -> Result<(), DeleteError> {
        let original = std::path::absolute(path).map_err(DeleteError::Remove)?;
        let resolved = resolve_parent(&original).map_err(DeleteError::Remove)?;
        let home = self.resolved_home().map_err(DeleteError::Remove)?;
        if home.starts_with(&resolved) || resolved.starts_with(&home) {
            return Err(DeleteError::HoldsTrash {
                trash: self.home.clone(),
            });
        }

        let slot = self
            .claim(&original, Local::now())
            .map_err(|source| DeleteError::TrashInfo {
                dir: self.info_dir(),
                source,
            })?;

        match fs::rename(&original, &slot.file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                // The trash is on another filesystem. Give the name back and
                // remove the entry for good.
                fs::remove_file(&slot.info).map_err(|source| DeleteError::TrashInfo {
                    dir: self.info_dir(),
                    source,
                })?;
                remove_permanently(&original).map_err(DeleteError::Remove)
            }
            Err(err) => {
                let _ = fs::remove_file(&slot.info);
                Err(DeleteError::Remove(err))
            }
        }
    }

    fn is_protected(&self, path: &Path) -> bool {
        let (Ok(home), Ok(path)) = (self.resolved_home(), resolve_parent(path)) else {
            return false;
        };
        path.starts_with(home)
    }
}

fn candidate_name(base: &OsStr, attempt: u64) -> OsString {
    let mut name = base.to_os_string();
    if attempt > 0 {
        name.push(format!(".{attempt}"));
    }
    name
}

/// Canonical form of `path` with only its parent resolved, so a symlink is
/// judged by where it sits rather than where it points.
fn resolve_parent(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(fs::canonicalize(parent)?.join(name)),
        _ => fs::canonicalize(&absolute),
    }
}

/// Canonicalizes the longest existing prefix of `path` and appends the rest
/// unchanged.
fn resolve_existing(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    for ancestor in absolute.ancestors() {
        let Ok(canonical) = fs::canonicalize(ancestor) else {
            continue;
        };
        let Ok(rest) = absolute.strip_prefix(ancestor) else {
            continue;
        };
        if rest.as_os_str().is_empty() {
            return Ok(canonical);
        }
        return Ok(canonical.join(rest));
    }
    Ok(absolute)
}

fn trash_info(original: &Path, deleted_at: DateTime<Local>) -> String {
    format!(
        "[Trash Info]\nPath={}\nDeletionDate={}\n",
        encode_path(original),
        deleted_at.format(TRASHINFO_TIME_FORMAT)
    )
}

/// Percent-encodes each component, keeping the separators.
fn encode_path(path: &Path) -> String {
    path.as_os_str()
        .as_bytes()
        .split(|byte| *byte == b'/')
        .map(|segment| urlencoding::encode_binary(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

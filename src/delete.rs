use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("{0}")]
    Remove(#[source] io::Error),

    #[error("cannot record trash entry in {dir}: {source}")]
    TrashInfo {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the trash directory {} is inside it", trash.display())]
    HoldsTrash { trash: PathBuf },
}

/// Removes one matched entry from the tree.
pub trait Deleter {
    fn delete_entry(&self, path: &Path) -> Result<(), DeleteError>;

    /// Entries the backend itself owns, such as the trash directory and
    /// everything below it. In delete mode the walk never enters these, so a
    /// backend that moves files never sees them a second time.
    fn is_protected(&self, _path: &Path) -> bool {
        false
    }
}

/// Unlinks files and symlinks, removes directories with their contents.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermanentDelete;

impl Deleter for PermanentDelete {
    fn delete_entry(&self, path: &Path) -> Result<(), DeleteError> {
        remove_permanently(path).map_err(DeleteError::Remove)
    }
}

pub(crate) fn remove_permanently(path: &Path) -> io::Result<()> {
    // symlink_metadata so a link to a directory is unlinked, not followed.
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_dir() {
        return fs::remove_dir_all(path);
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if file_type.is_symlink_dir() {
            return fs::remove_dir(path);
        }
    }

    fs::remove_file(path)
}

#[cfg(all(feature = "trash", unix, not(target_os = "macos")))]
pub fn default_deleter() -> Box<dyn Deleter> {
    match crate::trash::XdgTrash::from_env() {
        Some(trash) => Box::new(trash),
        None => Box::new(PermanentDelete),
    }
}

#[cfg(not(all(feature = "trash", unix, not(target_os = "macos"))))]
pub fn default_deleter() -> Box<dyn Deleter> {
    Box::new(PermanentDelete)
}

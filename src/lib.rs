//! Recursive file search by name, with optional deletion through the desktop
//! trash.

pub mod args;
pub mod delete;
#[cfg(all(feature = "trash", unix, not(target_os = "macos")))]
pub mod trash;
pub mod walk;

mod commands;
mod files;
mod paths;

pub use commands::HideWindow;
pub use files::{delete_expired_files, set_executable};
pub use paths::{AppPaths, AppPathsError};

//! Utility functions

use std::path::PathBuf;

use directories::ProjectDirs;

/// File name of the store inside the data directory
pub const DATABASE_FILE_NAME: &str = "music_database.db";

/// Platform directories of the application
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "alkhufash", "Music")
}

/// Default location of the store
pub fn default_database_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
}

/// Current time as epoch milliseconds
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Application services, assembled once at startup

use std::sync::Arc;

use tracing::info;

use crate::database::{Database, DbError};
use crate::library::MusicLibrary;
use crate::settings::Settings;

/// Errors that can occur while starting the services
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Could not determine data directory for the database")]
    NoDataDir,
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Shared handles to the store and everything built on it
#[derive(Debug, Clone)]
pub struct Services {
    pub database: Arc<Database>,
    pub library: MusicLibrary,
}

impl Services {
    /// Open the store described by `settings` and build the library on it
    pub async fn start(settings: &Settings) -> Result<Self, StartupError> {
        let path = settings
            .database
            .resolved_path()
            .ok_or(StartupError::NoDataDir)?;
        let database = Arc::new(Database::open(&path, &settings.database).await?);
        Ok(Self::with_database(database))
    }

    /// Build the services on an already open store
    pub fn with_database(database: Arc<Database>) -> Self {
        let library = MusicLibrary::new(database.clone());
        Self {
            database,
            library,
        }
    }

    /// Close the store, live queries still running end with an error
    pub async fn shutdown(self) {
        self.database.close().await;
        info!("Services shut down");
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn start_opens_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.database.path = Some(dir.path().join("data").join("music.db"));

        let services = Services::start(&settings).await.unwrap();
        let id = services.library.create_playlist("Morning").await.unwrap();
        services.shutdown().await;

        let services = Services::start(&settings).await.unwrap();
        let summary = services.library.summary().await.unwrap();
        assert_eq!(summary.playlists.len(), 1);
        assert_eq!(summary.playlists[0].id, id);
        services.shutdown().await;
    }

    #[tokio::test]
    async fn in_memory_services_share_one_store() {
        let database = Arc::new(Database::open_in_memory().await.unwrap());
        let services = Services::with_database(database);

        services.library.toggle_favorite(3).await.unwrap();
        assert!(services.database.is_favorite(3).await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_ends_library_streams() {
        let database = Arc::new(Database::open_in_memory().await.unwrap());
        let services = Services::with_database(database);
        let library = services.library.clone();
        let mut playlists = library.playlists();
        assert!(playlists.next().await.unwrap().is_ok());

        services.shutdown().await;

        let ended = tokio::time::timeout(std::time::Duration::from_millis(500), async {
            while let Some(item) = playlists.next().await {
                if item.is_err() {
                    return true;
                }
            }
            false
        })
        .await;
        assert_eq!(ended.ok(), Some(true));
        assert!(playlists.next().await.is_none());
    }
}

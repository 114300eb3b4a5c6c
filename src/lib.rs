//! Local persistence for a music player: favorites, playlists and play history
//! stored in SQLite, with live queries that re-emit whenever their tables change

pub mod database;
pub mod library;
pub mod services;
pub mod settings;
pub mod utils;

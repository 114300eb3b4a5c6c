//! Table change notification for live queries
//!
//! Every table has a version counter. Committed writes bump the counters of
//! the tables they touched, observers wake up when a table they watch moved.
//! A `watch` channel only keeps the latest value, so bursts of writes
//! coalesce into a single wake-up.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

/// Tables that live queries can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Favorites,
    Playlists,
    PlaylistSongs,
    RecentSongs,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Favorites,
        Table::Playlists,
        Table::PlaylistSongs,
        Table::RecentSongs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Favorites => "favorites",
            Table::Playlists => "playlists",
            Table::PlaylistSongs => "playlist_songs",
            Table::RecentSongs => "recent_songs",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableVersions([u64; 4]);

impl TableVersions {
    fn get(&self, table: Table) -> u64 {
        self.0[table.index()]
    }

    fn bump(&mut self, table: Table) {
        let version = &mut self.0[table.index()];
        *version = version.wrapping_add(1);
    }
}

/// Registry of table versions shared by a store and its observers
#[derive(Debug)]
pub struct InvalidationTracker {
    versions: watch::Sender<TableVersions>,
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationTracker {
    pub fn new() -> Self {
        let (versions, _) = watch::channel(TableVersions::default());
        Self { versions }
    }

    /// Mark tables as modified and wake their observers
    pub fn notify(&self, tables: &[Table]) {
        if tables.is_empty() {
            return;
        }
        self.versions.send_modify(|versions| {
            for table in tables {
                versions.bump(*table);
            }
        });
        trace!("Invalidated tables {:?}", tables);
    }

    /// Start observing `tables`. Changes made before this call are not
    /// reported.
    pub fn observe(&self, tables: &'static [Table]) -> TableObserver {
        let mut receiver = self.versions.subscribe();
        let seen = *receiver.borrow_and_update();
        TableObserver {
            receiver,
            tables,
            seen,
        }
    }

    /// Notify `tables` when dropped unless disarmed. Armed right before a
    /// commit, so that a commit whose caller went away mid-flight is never
    /// invisible to observers.
    pub(crate) fn pending<'a>(&'a self, tables: &'a [Table]) -> PendingInvalidation<'a> {
        PendingInvalidation {
            tracker: self,
            tables,
            armed: true,
        }
    }
}

/// Waits for changes of a fixed set of tables
#[derive(Debug)]
pub struct TableObserver {
    receiver: watch::Receiver<TableVersions>,
    tables: &'static [Table],
    seen: TableVersions,
}

impl TableObserver {
    /// Wait until one of the observed tables changed.
    /// Returns `false` once the tracker is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            if self.receiver.changed().await.is_err() {
                return false;
            }
            let current = *self.receiver.borrow_and_update();
            let touched = self
                .tables
                .iter()
                .any(|table| current.get(*table) != self.seen.get(*table));
            self.seen = current;
            if touched {
                return true;
            }
        }
    }

    pub fn tables(&self) -> &'static [Table] {
        self.tables
    }
}

pub(crate) struct PendingInvalidation<'a> {
    tracker: &'a InvalidationTracker,
    tables: &'a [Table],
    armed: bool,
}

impl PendingInvalidation<'_> {
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingInvalidation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.notify(self.tables);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn changed_within(observer: &mut TableObserver, millis: u64) -> Option<bool> {
        tokio::time::timeout(Duration::from_millis(millis), observer.changed())
            .await
            .ok()
    }

    #[tokio::test]
    async fn observer_wakes_only_for_its_tables() {
        let tracker = InvalidationTracker::new();
        let mut observer = tracker.observe(&[Table::Favorites]);

        tracker.notify(&[Table::RecentSongs]);
        assert_eq!(changed_within(&mut observer, 50).await, None);

        tracker.notify(&[Table::Favorites]);
        assert_eq!(changed_within(&mut observer, 50).await, Some(true));
    }

    #[tokio::test]
    async fn bursts_coalesce_into_one_wake_up() {
        let tracker = InvalidationTracker::new();
        let mut observer = tracker.observe(&[Table::Playlists, Table::PlaylistSongs]);

        tracker.notify(&[Table::Playlists]);
        tracker.notify(&[Table::PlaylistSongs]);
        tracker.notify(&[Table::Playlists]);

        assert_eq!(changed_within(&mut observer, 50).await, Some(true));
        assert_eq!(changed_within(&mut observer, 50).await, None);
    }

    #[tokio::test]
    async fn changes_before_observing_are_ignored() {
        let tracker = InvalidationTracker::new();
        tracker.notify(&[Table::Favorites]);

        let mut observer = tracker.observe(&[Table::Favorites]);
        assert_eq!(changed_within(&mut observer, 50).await, None);
    }

    #[tokio::test]
    async fn observer_ends_with_tracker() {
        let tracker = InvalidationTracker::new();
        let mut observer = tracker.observe(&Table::ALL);
        drop(tracker);
        assert!(!observer.changed().await);
    }

    #[tokio::test]
    async fn pending_invalidation_notifies_unless_disarmed() {
        let tracker = InvalidationTracker::new();
        let mut observer = tracker.observe(&[Table::RecentSongs]);

        tracker.pending(&[Table::RecentSongs]).disarm();
        assert_eq!(changed_within(&mut observer, 50).await, None);

        drop(tracker.pending(&[Table::RecentSongs]));
        assert_eq!(changed_within(&mut observer, 50).await, Some(true));
    }
}

use std::sync::Arc;

use sensexbot::adapter::outbound::sqlite::SqliteStore;
use tempfile::TempDir;

/// SQLite database in its own temporary directory.
///
/// [`TempDb::reopen`] opens a second handle on the same file, which is how
/// a restart is simulated.
pub struct TempDb {
    dir: TempDir,
    store: Arc<SqliteStore>,
}

impl TempDb {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Arc::new(SqliteStore::open(&Self::path_in(&dir)).expect("open sqlite store"));
        Self { dir, store }
    }

    fn path_in(dir: &TempDir) -> String {
        dir.path().join("sensexbot.db").display().to_string()
    }

    pub fn path(&self) -> String {
        Self::path_in(&self.dir)
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    pub fn reopen(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open(&self.path()).expect("reopen sqlite store"))
    }
}

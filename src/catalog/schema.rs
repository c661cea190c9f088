use super::{CatalogError, CatalogStore};

impl CatalogStore {
    pub(super) fn apply_pragmas(&self) -> Result<(), CatalogError> {
        self.connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
        )?;
        Ok(())
    }

    pub(super) fn apply_schema(&self) -> Result<(), CatalogError> {
        self.connection.execute_batch(
            "PRAGMA foreign_keys=ON;
             CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE
             );
             CREATE TABLE IF NOT EXISTS moods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE
             );
             CREATE TABLE IF NOT EXISTS tracks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                genre_id INTEGER REFERENCES genres(id) ON DELETE SET NULL,
                mood_id INTEGER REFERENCES moods(id) ON DELETE SET NULL,
                tags TEXT NOT NULL DEFAULT '',
                artist_name TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT 'English',
                lyrics TEXT NOT NULL DEFAULT '',
                audio_key TEXT NOT NULL,
                duration INTEGER NOT NULL DEFAULT 0,
                bpm INTEGER,
                detected_bpm INTEGER,
                waveform_data TEXT,
                download_count INTEGER NOT NULL DEFAULT 0,
                play_count INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_featured INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_tracks_active_created
                ON tracks (is_active, created_at);
             CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks (genre_id);
             CREATE INDEX IF NOT EXISTS idx_tracks_mood ON tracks (mood_id);
             CREATE INDEX IF NOT EXISTS idx_tracks_downloads ON tracks (download_count);",
        )?;
        Ok(())
    }
}

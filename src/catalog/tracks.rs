use std::collections::HashSet;

use rusqlite::{OptionalExtension, Row, Transaction, params};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::waveform::PeakSeries;

use super::{CatalogError, CatalogStore, Category, Track, genre_name, mood_name};

pub(super) const TRACK_COLUMNS: &str = "t.id, t.title, t.description, g.id, g.name, g.slug, \
     m.id, m.name, m.slug, t.tags, t.artist_name, t.language, t.lyrics, t.audio_key, \
     t.duration, t.bpm, t.detected_bpm, t.waveform_data, t.download_count, t.play_count, \
     t.is_active, t.is_featured, t.created_at, t.updated_at";
pub(super) const TRACK_FROM: &str = "FROM tracks t \
     LEFT JOIN genres g ON g.id = t.genre_id \
     LEFT JOIN moods m ON m.id = t.mood_id";

/// Fields of a track about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub title: String,
    pub description: String,
    pub genre_slug: Option<String>,
    pub mood_slug: Option<String>,
    pub tags: String,
    pub artist_name: String,
    pub language: String,
    pub lyrics: String,
    pub audio_key: String,
    pub duration_seconds: u32,
    pub bpm: Option<u32>,
    pub detected_bpm: Option<u32>,
    pub waveform: Option<PeakSeries>,
    pub is_active: bool,
    pub is_featured: bool,
}

#[derive(Clone, Copy)]
enum CategoryTable {
    Genres,
    Moods,
}

impl CategoryTable {
    fn name(self) -> &'static str {
        match self {
            Self::Genres => "genres",
            Self::Moods => "moods",
        }
    }

    fn display_name(self, slug: &str) -> String {
        match self {
            Self::Genres => genre_name(slug),
            Self::Moods => mood_name(slug),
        }
    }
}

/// Raw column values; converted to [`Track`] outside the rusqlite row closure.
pub(super) struct TrackRow {
    id: String,
    title: String,
    description: String,
    genre: (Option<i64>, Option<String>, Option<String>),
    mood: (Option<i64>, Option<String>, Option<String>),
    tags: String,
    artist_name: String,
    language: String,
    lyrics: String,
    audio_key: String,
    duration: i64,
    bpm: Option<i64>,
    detected_bpm: Option<i64>,
    waveform_data: Option<String>,
    download_count: i64,
    play_count: i64,
    is_active: bool,
    is_featured: bool,
    created_at: i64,
    updated_at: i64,
}

impl TrackRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            genre: (row.get(3)?, row.get(4)?, row.get(5)?),
            mood: (row.get(6)?, row.get(7)?, row.get(8)?),
            tags: row.get(9)?,
            artist_name: row.get(10)?,
            language: row.get(11)?,
            lyrics: row.get(12)?,
            audio_key: row.get(13)?,
            duration: row.get(14)?,
            bpm: row.get(15)?,
            detected_bpm: row.get(16)?,
            waveform_data: row.get(17)?,
            download_count: row.get(18)?,
            play_count: row.get(19)?,
            is_active: row.get(20)?,
            is_featured: row.get(21)?,
            created_at: row.get(22)?,
            updated_at: row.get(23)?,
        })
    }

    pub(super) fn into_track(self) -> Result<Track, CatalogError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| CatalogError::InvalidValue {
            column: "id",
            value: self.id.clone(),
        })?;
        let waveform = match self.waveform_data.as_deref() {
            None => None,
            Some(text) => Some(serde_json::from_str::<PeakSeries>(text)?),
        };
        Ok(Track {
            id,
            title: self.title,
            description: self.description,
            genre: category(self.genre),
            mood: category(self.mood),
            tags: self.tags,
            artist_name: self.artist_name,
            language: self.language,
            lyrics: self.lyrics,
            audio_key: self.audio_key,
            duration_seconds: to_u32("duration", self.duration)?,
            bpm: self.bpm.map(|bpm| to_u32("bpm", bpm)).transpose()?,
            detected_bpm: self
                .detected_bpm
                .map(|bpm| to_u32("detected_bpm", bpm))
                .transpose()?,
            waveform,
            download_count: self.download_count.max(0) as u64,
            play_count: self.play_count.max(0) as u64,
            is_active: self.is_active,
            is_featured: self.is_featured,
            created_at: from_micros("created_at", self.created_at)?,
            updated_at: from_micros("updated_at", self.updated_at)?,
        })
    }
}

fn category(columns: (Option<i64>, Option<String>, Option<String>)) -> Option<Category> {
    match columns {
        (Some(id), Some(name), Some(slug)) => Some(Category { id, name, slug }),
        _ => None,
    }
}

fn to_u32(column: &'static str, value: i64) -> Result<u32, CatalogError> {
    u32::try_from(value).map_err(|_| CatalogError::InvalidValue {
        column,
        value: value.to_string(),
    })
}

pub(super) fn now_micros() -> i64 {
    to_micros(OffsetDateTime::now_utc())
}

fn to_micros(when: OffsetDateTime) -> i64 {
    i64::try_from(when.unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX)
}

fn from_micros(column: &'static str, micros: i64) -> Result<OffsetDateTime, CatalogError> {
    OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1_000).map_err(|_| {
        CatalogError::InvalidValue {
            column,
            value: micros.to_string(),
        }
    })
}

fn waveform_json(waveform: Option<&PeakSeries>) -> Result<Option<String>, CatalogError> {
    waveform
        .map(serde_json::to_string)
        .transpose()
        .map_err(CatalogError::from)
}

impl CatalogStore {
    /// Look up a track by its unique title, active or not.
    pub fn find_by_title(&self, title: &str) -> Result<Option<Track>, CatalogError> {
        self.query_one(&format!("SELECT {TRACK_COLUMNS} {TRACK_FROM} WHERE t.title = ?1"), title)
    }

    /// Fetch an active track by id.
    pub fn get_track(&self, id: Uuid) -> Result<Option<Track>, CatalogError> {
        self.query_one(
            &format!("SELECT {TRACK_COLUMNS} {TRACK_FROM} WHERE t.id = ?1 AND t.is_active = 1"),
            &id.to_string(),
        )
    }

    fn query_one(&self, sql: &str, key: &str) -> Result<Option<Track>, CatalogError> {
        let row = self
            .connection
            .query_row(sql, [key], TrackRow::from_row)
            .optional()?;
        row.map(TrackRow::into_track).transpose()
    }

    pub(super) fn query_tracks(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Track>, CatalogError> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt
            .query_map(params, TrackRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TrackRow::into_track).collect()
    }

    /// Every track, oldest first.
    pub fn load_all(&self) -> Result<Vec<Track>, CatalogError> {
        self.query_tracks(
            &format!("SELECT {TRACK_COLUMNS} {TRACK_FROM} ORDER BY t.created_at ASC, t.seq ASC"),
            [],
        )
    }

    /// Replace the whole track table with `tracks` in one transaction.
    ///
    /// Tracks are matched by id; rows not present in `tracks` are deleted.
    pub fn save_all(&mut self, tracks: &[Track]) -> Result<(), CatalogError> {
        let tx = self.connection.transaction()?;
        let keep: HashSet<String> = tracks.iter().map(|track| track.id.to_string()).collect();
        let existing: Vec<String> = tx
            .prepare("SELECT id FROM tracks")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        for id in existing.iter().filter(|id| !keep.contains(*id)) {
            tx.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        }
        for track in tracks {
            upsert_track(&tx, track)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a new track, creating its genre and mood on first use.
    pub fn insert_track(&mut self, new: &NewTrack) -> Result<Track, CatalogError> {
        let id = Uuid::new_v4();
        let now = now_micros();
        let tx = self.connection.transaction()?;
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracks WHERE title = ?1)",
            [&new.title],
            |row| row.get(0),
        )?;
        if taken {
            return Err(CatalogError::DuplicateTitle(new.title.clone()));
        }
        let genre_id = new
            .genre_slug
            .as_deref()
            .map(|slug| get_or_create_category(&tx, CategoryTable::Genres, slug))
            .transpose()?;
        let mood_id = new
            .mood_slug
            .as_deref()
            .map(|slug| get_or_create_category(&tx, CategoryTable::Moods, slug))
            .transpose()?;
        tx.execute(
            "INSERT INTO tracks (id, title, description, genre_id, mood_id, tags, artist_name,
                language, lyrics, audio_key, duration, bpm, detected_bpm, waveform_data,
                is_active, is_featured, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
            params![
                id.to_string(),
                new.title,
                new.description,
                genre_id,
                mood_id,
                new.tags,
                new.artist_name,
                new.language,
                new.lyrics,
                new.audio_key,
                new.duration_seconds,
                new.bpm,
                new.detected_bpm,
                waveform_json(new.waveform.as_ref())?,
                new.is_active,
                new.is_featured,
                now,
            ],
        )?;
        tx.commit()?;
        let track = self
            .find_by_title(&new.title)?
            .ok_or(CatalogError::TrackNotFound(id))?;
        Ok(track)
    }

    /// Active tracks with no stored waveform, oldest first.
    pub fn tracks_missing_waveform(&self) -> Result<Vec<Track>, CatalogError> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} {TRACK_FROM}
                 WHERE t.is_active = 1 AND t.waveform_data IS NULL
                 ORDER BY t.created_at ASC, t.seq ASC"
            ),
            [],
        )
    }

    /// Replace a track's waveform preview.
    pub fn set_waveform(&self, id: Uuid, peaks: &PeakSeries) -> Result<(), CatalogError> {
        let changed = self.connection.execute(
            "UPDATE tracks SET waveform_data = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(peaks)?, now_micros(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(CatalogError::TrackNotFound(id));
        }
        Ok(())
    }

    /// Count one play of an active track; returns the new play count.
    pub fn record_play(&self, id: Uuid) -> Result<u64, CatalogError> {
        let count: Option<i64> = self
            .connection
            .query_row(
                "UPDATE tracks SET play_count = play_count + 1
                 WHERE id = ?1 AND is_active = 1
                 RETURNING play_count",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        count
            .map(|count| count.max(0) as u64)
            .ok_or(CatalogError::TrackNotFound(id))
    }

    /// Count one download of an active track; returns the audio key to stream.
    pub fn record_download(&self, id: Uuid) -> Result<String, CatalogError> {
        self.connection
            .query_row(
                "UPDATE tracks SET download_count = download_count + 1
                 WHERE id = ?1 AND is_active = 1
                 RETURNING audio_key",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(CatalogError::TrackNotFound(id))
    }
}

fn get_or_create_category(
    tx: &Transaction<'_>,
    table: CategoryTable,
    slug: &str,
) -> Result<i64, CatalogError> {
    let name = table.display_name(slug);
    let table = table.name();
    let existing: Option<i64> = tx
        .query_row(
            &format!("SELECT id FROM {table} WHERE slug = ?1"),
            [slug],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    tx.execute(
        &format!("INSERT INTO {table} (name, slug) VALUES (?1, ?2)"),
        params![name, slug],
    )?;
    Ok(tx.last_insert_rowid())
}

fn upsert_track(tx: &Transaction<'_>, track: &Track) -> Result<(), CatalogError> {
    let genre_id = track
        .genre
        .as_ref()
        .map(|genre| get_or_create_category(tx, CategoryTable::Genres, &genre.slug))
        .transpose()?;
    let mood_id = track
        .mood
        .as_ref()
        .map(|mood| get_or_create_category(tx, CategoryTable::Moods, &mood.slug))
        .transpose()?;
    tx.execute(
        "INSERT INTO tracks (id, title, description, genre_id, mood_id, tags, artist_name,
            language, lyrics, audio_key, duration, bpm, detected_bpm, waveform_data,
            download_count, play_count, is_active, is_featured, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title, description = excluded.description,
            genre_id = excluded.genre_id, mood_id = excluded.mood_id, tags = excluded.tags,
            artist_name = excluded.artist_name, language = excluded.language,
            lyrics = excluded.lyrics, audio_key = excluded.audio_key,
            duration = excluded.duration, bpm = excluded.bpm,
            detected_bpm = excluded.detected_bpm, waveform_data = excluded.waveform_data,
            download_count = excluded.download_count, play_count = excluded.play_count,
            is_active = excluded.is_active, is_featured = excluded.is_featured,
            created_at = excluded.created_at, updated_at = excluded.updated_at",
        params![
            track.id.to_string(),
            track.title,
            track.description,
            genre_id,
            mood_id,
            track.tags,
            track.artist_name,
            track.language,
            track.lyrics,
            track.audio_key,
            track.duration_seconds,
            track.bpm,
            track.detected_bpm,
            waveform_json(track.waveform.as_ref())?,
            i64::try_from(track.download_count).unwrap_or(i64::MAX),
            i64::try_from(track.play_count).unwrap_or(i64::MAX),
            track.is_active,
            track.is_featured,
            to_micros(track.created_at),
            to_micros(track.updated_at),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    pub(in crate::catalog) fn new_track(title: &str, genre: &str, mood: &str) -> NewTrack {
        NewTrack {
            title: title.to_string(),
            description: format!("AI-generated {genre} track. {title}"),
            genre_slug: Some(genre.to_string()),
            mood_slug: Some(mood.to_string()),
            tags: format!("{genre}, {mood}, ai generated, royalty free"),
            artist_name: "Aria Vale".into(),
            language: "English".into(),
            lyrics: String::new(),
            audio_key: format!("tracks/2025/06/{}.wav", title.to_lowercase().replace(' ', "_")),
            duration_seconds: 60,
            bpm: Some(100),
            detected_bpm: None,
            waveform: None,
            is_active: true,
            is_featured: false,
        }
    }

    #[test]
    fn insert_then_find_by_title() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let inserted = store.insert_track(&new_track("Paper Moon", "lo-fi", "chill")).unwrap();

        let found = store.find_by_title("Paper Moon").unwrap().unwrap();

        assert_eq!(found, inserted);
        let genre = found.genre.unwrap();
        assert_eq!(genre.slug, "lo-fi");
        assert_eq!(genre.name, "Lo Fi");
        assert_eq!(found.mood.unwrap().name, "Chill");
        assert!(store.find_by_title("Missing").unwrap().is_none());
    }

    #[test]
    fn dashed_slugs_name_genres_and_moods_differently() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let track = store
            .insert_track(&new_track("Sunny Side", "hip-hop", "feel-good"))
            .unwrap();

        assert_eq!(track.genre.unwrap().name, "Hip Hop");
        let mood = track.mood.unwrap();
        assert_eq!(mood.slug, "feel-good");
        assert_eq!(mood.name, "Feel-Good");
    }

    #[test]
    fn duplicate_title_is_rejected() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store.insert_track(&new_track("A", "pop", "happy")).unwrap();
        assert!(matches!(
            store.insert_track(&new_track("A", "rock", "sad")),
            Err(CatalogError::DuplicateTitle(_))
        ));
    }

    #[test]
    fn categories_are_shared_by_slug() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let a = store.insert_track(&new_track("A", "pop", "happy")).unwrap();
        let b = store.insert_track(&new_track("B", "pop", "sad")).unwrap();
        assert_eq!(a.genre.unwrap().id, b.genre.unwrap().id);
        assert_ne!(a.mood.unwrap().id, b.mood.unwrap().id);
    }

    #[test]
    fn save_all_replaces_and_deletes() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store.insert_track(&new_track("A", "pop", "happy")).unwrap();
        store.insert_track(&new_track("B", "pop", "happy")).unwrap();
        let mut tracks = store.load_all().unwrap();
        assert_eq!(tracks.len(), 2);
        tracks.remove(0);
        tracks[0].bpm = Some(140);
        tracks[0].play_count = 7;

        store.save_all(&tracks).unwrap();

        let reloaded = store.load_all().unwrap();
        assert_eq!(reloaded, tracks);
        assert!(store.find_by_title("A").unwrap().is_none());
    }

    #[test]
    fn counters_increment_and_download_returns_key() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let track = store.insert_track(&new_track("A", "pop", "happy")).unwrap();

        assert_eq!(store.record_play(track.id).unwrap(), 1);
        assert_eq!(store.record_play(track.id).unwrap(), 2);
        assert_eq!(store.record_download(track.id).unwrap(), track.audio_key);

        let reloaded = store.get_track(track.id).unwrap().unwrap();
        assert_eq!(reloaded.play_count, 2);
        assert_eq!(reloaded.download_count, 1);
        assert!(matches!(
            store.record_play(Uuid::new_v4()),
            Err(CatalogError::TrackNotFound(_))
        ));
    }

    #[test]
    fn inactive_tracks_are_hidden_from_get_and_counters() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut new = new_track("Hidden", "pop", "happy");
        new.is_active = false;
        let track = store.insert_track(&new).unwrap();

        assert!(store.get_track(track.id).unwrap().is_none());
        assert!(store.record_download(track.id).is_err());
        assert!(store.find_by_title("Hidden").unwrap().is_some());
    }

    #[test]
    fn waveform_is_stored_and_missing_list_shrinks() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let a = store.insert_track(&new_track("A", "pop", "happy")).unwrap();
        store.insert_track(&new_track("B", "pop", "happy")).unwrap();
        assert_eq!(store.tracks_missing_waveform().unwrap().len(), 2);

        let peaks: PeakSeries = serde_json::from_str("[0.1,1.0]").unwrap();
        store.set_waveform(a.id, &peaks).unwrap();

        let missing = store.tracks_missing_waveform().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].title, "B");
        assert_eq!(store.get_track(a.id).unwrap().unwrap().waveform, Some(peaks));
    }
}

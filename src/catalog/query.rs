use std::str::FromStr;

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use uuid::Uuid;

use super::tracks::{TRACK_COLUMNS, TRACK_FROM};
use super::{CatalogError, CatalogStore, Category, Track};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Sortable track columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    DownloadCount,
    PlayCount,
    Duration,
    Bpm,
}

impl OrderField {
    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "t.created_at",
            Self::DownloadCount => "t.download_count",
            Self::PlayCount => "t.play_count",
            Self::Duration => "t.duration",
            Self::Bpm => "t.bpm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOrdering {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for TrackOrdering {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: OrderField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for TrackOrdering {
    type Err = CatalogError;

    /// Parse `field` or `-field` (descending).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match value.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, value),
        };
        let field = match name {
            "created_at" => OrderField::CreatedAt,
            "download_count" => OrderField::DownloadCount,
            "play_count" => OrderField::PlayCount,
            "duration" => OrderField::Duration,
            "bpm" => OrderField::Bpm,
            _ => return Err(CatalogError::InvalidOrdering(value.to_string())),
        };
        Ok(Self { field, descending })
    }
}

/// Filters, search and paging for [`CatalogStore::list_tracks`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackQuery {
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub min_duration: Option<u32>,
    pub max_duration: Option<u32>,
    pub min_bpm: Option<u32>,
    pub max_bpm: Option<u32>,
    pub featured: Option<bool>,
    /// Whitespace-separated terms; every term must appear in the title, description, tags
    /// or artist name (case-insensitive).
    pub search: Option<String>,
    pub ordering: TrackOrdering,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for TrackQuery {
    fn default() -> Self {
        Self {
            genre: None,
            mood: None,
            min_duration: None,
            max_duration: None,
            min_bpm: None,
            max_bpm: None,
            featured: None,
            search: None,
            ordering: TrackOrdering::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPage {
    /// Matching tracks across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub tracks: Vec<Track>,
}

/// A genre or mood with the number of active tracks using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: Category,
    pub track_count: u64,
}

struct WhereClause {
    sql: String,
    values: Vec<Value>,
}

impl TrackQuery {
    fn where_clause(&self) -> WhereClause {
        let mut conditions = vec!["t.is_active = 1".to_string()];
        let mut values = Vec::new();
        let mut push = |condition: &str, value: Value| {
            values.push(value);
            conditions.push(condition.replace('?', &format!("?{}", values.len())));
        };
        if let Some(genre) = &self.genre {
            push("g.slug = ?", Value::Text(genre.clone()));
        }
        if let Some(mood) = &self.mood {
            push("m.slug = ?", Value::Text(mood.clone()));
        }
        if let Some(min) = self.min_duration {
            push("t.duration >= ?", Value::Integer(min.into()));
        }
        if let Some(max) = self.max_duration {
            push("t.duration <= ?", Value::Integer(max.into()));
        }
        if let Some(min) = self.min_bpm {
            push("t.bpm >= ?", Value::Integer(min.into()));
        }
        if let Some(max) = self.max_bpm {
            push("t.bpm <= ?", Value::Integer(max.into()));
        }
        if let Some(featured) = self.featured {
            push("t.is_featured = ?", Value::Integer(featured.into()));
        }
        for term in self.search.iter().flat_map(|search| search.split_whitespace()) {
            let pattern = format!("%{}%", escape_like(term));
            push(
                "(t.title LIKE ? ESCAPE '\\' OR t.description LIKE ? ESCAPE '\\' \
                 OR t.tags LIKE ? ESCAPE '\\' OR t.artist_name LIKE ? ESCAPE '\\')",
                Value::Text(pattern),
            );
        }
        WhereClause {
            sql: conditions.join(" AND "),
            values,
        }
    }

    fn page_bounds(&self) -> (u32, u32) {
        (self.page.max(1), self.page_size.clamp(1, MAX_PAGE_SIZE))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl CatalogStore {
    /// Filtered, searched, ordered and paginated listing of active tracks.
    ///
    /// `page` below 1 is treated as 1 and `page_size` is clamped to `1..=100`; a page past
    /// the end is empty.
    pub fn list_tracks(&self, query: &TrackQuery) -> Result<TrackPage, CatalogError> {
        let clause = query.where_clause();
        let total: i64 = self.connection.query_row(
            &format!("SELECT COUNT(*) {TRACK_FROM} WHERE {}", clause.sql),
            params_from_iter(clause.values.iter()),
            |row| row.get(0),
        )?;

        let (page, page_size) = query.page_bounds();
        let offset = u64::from(page - 1) * u64::from(page_size);
        let direction = if query.ordering.descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {TRACK_COLUMNS} {TRACK_FROM} WHERE {} ORDER BY {} {direction}, t.seq {direction} \
             LIMIT {page_size} OFFSET {offset}",
            clause.sql,
            query.ordering.field.column(),
        );
        let tracks = self.query_tracks(&sql, params_from_iter(clause.values.iter()))?;
        Ok(TrackPage {
            total: total.max(0) as u64,
            page,
            page_size,
            tracks,
        })
    }

    /// Active tracks sharing the genre or mood of `id`, most downloaded first.
    pub fn similar_tracks(&self, id: Uuid, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let track = self.get_track(id)?.ok_or(CatalogError::TrackNotFound(id))?;
        let genre_id = track.genre.as_ref().map(|genre| genre.id);
        let mood_id = track.mood.as_ref().map(|mood| mood.id);
        if genre_id.is_none() && mood_id.is_none() {
            return Ok(Vec::new());
        }
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} {TRACK_FROM}
                 WHERE t.is_active = 1 AND t.id != ?1
                   AND (t.genre_id = ?2 OR t.mood_id = ?3)
                 ORDER BY t.download_count DESC, t.seq ASC
                 LIMIT ?4"
            ),
            rusqlite::params![id.to_string(), genre_id, mood_id, limit as i64],
        )
    }

    /// Active featured tracks, newest first.
    pub fn featured_tracks(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} {TRACK_FROM}
                 WHERE t.is_active = 1 AND t.is_featured = 1
                 ORDER BY t.created_at DESC, t.seq DESC
                 LIMIT ?1"
            ),
            [limit as i64],
        )
    }

    /// Most downloaded active tracks.
    pub fn popular_tracks(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} {TRACK_FROM}
                 WHERE t.is_active = 1
                 ORDER BY t.download_count DESC, t.created_at DESC, t.seq DESC
                 LIMIT ?1"
            ),
            [limit as i64],
        )
    }

    /// All genres by name, each with its active track count.
    pub fn genres_with_counts(&self) -> Result<Vec<CategoryCount>, CatalogError> {
        self.categories_with_counts("genres", "genre_id")
    }

    /// All moods by name, each with its active track count.
    pub fn moods_with_counts(&self) -> Result<Vec<CategoryCount>, CatalogError> {
        self.categories_with_counts("moods", "mood_id")
    }

    fn categories_with_counts(
        &self,
        table: &str,
        column: &str,
    ) -> Result<Vec<CategoryCount>, CatalogError> {
        let mut stmt = self.connection.prepare(&format!(
            "SELECT c.id, c.name, c.slug,
                    (SELECT COUNT(*) FROM tracks t WHERE t.{column} = c.id AND t.is_active = 1)
             FROM {table} c
             ORDER BY c.name ASC"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryCount {
                category: Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                },
                track_count: row.get::<_, i64>(3)?.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

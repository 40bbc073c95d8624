use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RawId;

/// A movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub movie_id: RawId,
    pub title: String,
    pub genres: Vec<String>,
    pub img_link: Option<String>,
}

/// A single user rating
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rating {
    pub user_id: u32,
    pub movie_id: RawId,
    pub rating: f64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Catalog CSV Records
// ============================================================================

/// Row of the movies file (`movieId,title,genres`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub movie_id: RawId,
    pub title: String,
    #[serde(default)]
    pub genres: String,
}

/// Row of the poster file (`movieId,img_link`)
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "movieId")]
    pub movie_id: RawId,
    #[serde(default)]
    pub img_link: Option<String>,
}

/// Row of the ratings file (`userId,movieId,rating,timestamp`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub user_id: u32,
    pub movie_id: RawId,
    pub rating: f64,
    pub timestamp: i64,
}

impl Movie {
    /// Stand-in for a scored movie that has no catalog row
    pub fn unlisted(movie_id: RawId) -> Self {
        Self {
            movie_id,
            title: format!("Movie {}", movie_id),
            genres: Vec::new(),
            img_link: None,
        }
    }

    pub fn from_record(record: MovieRecord, img_link: Option<String>) -> Self {
        let genres = record
            .genres
            .split('|')
            .map(str::trim)
            .filter(|g| !g.is_empty() && *g != "(no genres listed)")
            .map(str::to_string)
            .collect();

        Self {
            movie_id: record.movie_id,
            title: record.title,
            genres,
            img_link: img_link.filter(|link| !link.trim().is_empty()),
        }
    }
}

impl From<RatingRecord> for Rating {
    fn from(record: RatingRecord) -> Self {
        Self {
            user_id: record.user_id,
            movie_id: record.movie_id,
            rating: record.rating,
            timestamp: DateTime::from_timestamp(record.timestamp, 0).unwrap_or_default(),
        }
    }
}

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use crate::{
    error::AppResult,
    models::{IdMapping, ImageRecord, Movie, MovieRecord, Rating, RatingRecord, RawId},
};

/// Movie metadata and user ratings, used for presentation and the user gate
pub struct Catalog {
    /// Ordered by movie id, which fixes candidate order for user rankings
    movies: BTreeMap<RawId, Movie>,
    ratings_by_user: HashMap<u32, Vec<Rating>>,
}

impl Catalog {
    /// Loads the catalog files and keeps only movies the matrices know about
    pub fn load(
        movies_csv: &Path,
        images_csv: Option<&Path>,
        ratings_csv: &Path,
        mapping: &IdMapping,
    ) -> AppResult<Self> {
        let images: HashMap<RawId, Option<String>> = match images_csv {
            Some(path) => read_csv::<ImageRecord>(path)?
                .into_iter()
                .map(|record| (record.movie_id, record.img_link))
                .collect(),
            None => HashMap::new(),
        };

        let records = read_csv::<MovieRecord>(movies_csv)?;
        let total = records.len();
        let movies: Vec<Movie> = records
            .into_iter()
            .filter(|record| mapping.contains_raw(record.movie_id))
            .map(|record| {
                let img_link = images.get(&record.movie_id).cloned().flatten();
                Movie::from_record(record, img_link)
            })
            .collect();

        let ratings: Vec<Rating> = read_csv::<RatingRecord>(ratings_csv)?
            .into_iter()
            .map(Rating::from)
            .collect();

        tracing::info!(
            movies = movies.len(),
            dropped_movies = total - movies.len(),
            posters = images.len(),
            ratings = ratings.len(),
            "Catalog loaded"
        );

        let catalog = Self::from_parts(movies, ratings);
        let unlisted = catalog.unlisted_movies(mapping);
        if !unlisted.is_empty() {
            tracing::warn!(
                count = unlisted.len(),
                first = unlisted[0],
                "Mapped movies missing from the catalog, they will be shown without metadata"
            );
        }

        Ok(catalog)
    }

    pub fn from_parts(movies: Vec<Movie>, ratings: Vec<Rating>) -> Self {
        let movies = movies.into_iter().map(|m| (m.movie_id, m)).collect();

        let mut ratings_by_user: HashMap<u32, Vec<Rating>> = HashMap::new();
        for rating in ratings {
            ratings_by_user.entry(rating.user_id).or_default().push(rating);
        }

        Self {
            movies,
            ratings_by_user,
        }
    }

    pub fn movie(&self, movie_id: RawId) -> Option<&Movie> {
        self.movies.get(&movie_id)
    }

    pub fn movie_count(&self) -> usize {
        self.movies.len()
    }

    /// Mapped movie ids with no catalog row, ascending inner id
    pub fn unlisted_movies(&self, mapping: &IdMapping) -> Vec<RawId> {
        (0..mapping.len())
            .filter_map(|inner| mapping.to_raw(inner))
            .filter(|raw| !self.movies.contains_key(raw))
            .collect()
    }

    /// Case-insensitive title search, ordered by title
    ///
    /// An empty query lists the whole catalog up to `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Movie> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<&Movie> = self
            .movies
            .values()
            .filter(|m| needle.is_empty() || m.title.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title).then(a.movie_id.cmp(&b.movie_id)));
        matches.truncate(limit);
        matches
    }

    pub fn has_user(&self, user_id: u32) -> bool {
        self.ratings_by_user.contains_key(&user_id)
    }

    pub fn user_ratings(&self, user_id: u32) -> &[Rating] {
        self.ratings_by_user
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Catalog movies the user has not rated, ascending movie id
    pub fn unseen_movies(&self, user_id: u32) -> Vec<RawId> {
        let seen: HashSet<RawId> = self
            .user_ratings(user_id)
            .iter()
            .map(|r| r.movie_id)
            .collect();

        self.movies
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect()
    }

    pub fn all_ratings(&self) -> impl Iterator<Item = &Rating> {
        self.ratings_by_user.values().flatten()
    }
}

/// Reads a headered CSV file into typed records
///
/// Files that are not valid UTF-8 are decoded as Latin-1, which is how the
/// MovieLens metadata ships.
fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let bytes = std::fs::read(path).map_err(csv::Error::from)?;
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(&bytes);
    let text = if had_errors {
        tracing::debug!(path = %path.display(), "CSV file is not UTF-8, decoding as Latin-1");
        encoding_rs::mem::decode_latin1(&bytes)
    } else {
        text
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(text.as_bytes()));

    let mut records = Vec::new();
    for result in reader.deserialize() {
        records.push(result?);
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "Read CSV file");

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_files(dir: &TempDir) {
        fs::write(
            dir.path().join("movies.csv"),
            "movieId,title,genres\n\
             1,Toy Story (1995),Animation|Children's|Comedy\n\
             2,Jumanji (1995),Adventure|Children's|Fantasy\n\
             3,Grumpier Old Men (1995),Comedy|Romance\n\
             4,Not In Matrix (1995),Drama\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("images.csv"),
            "movieId,img_link\n1,https://img/1.jpg\n3,\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("ratings.csv"),
            "userId,movieId,rating,timestamp\n\
             1,1,5,978300760\n\
             1,3,3,978302109\n\
             2,2,4,978301968\n",
        )
        .unwrap();
    }

    fn load(dir: &TempDir) -> Catalog {
        let mapping = IdMapping::new(vec![1, 2, 3]).unwrap();
        Catalog::load(
            &dir.path().join("movies.csv"),
            Some(dir.path().join("images.csv").as_path()),
            &dir.path().join("ratings.csv"),
            &mapping,
        )
        .unwrap()
    }

    #[test]
    fn test_load_filters_to_mapped_movies() {
        let dir = TempDir::new().unwrap();
        write_files(&dir);
        let catalog = load(&dir);

        assert_eq!(catalog.movie_count(), 3);
        assert!(catalog.movie(4).is_none());
        assert_eq!(
            catalog.movie(1).unwrap().img_link.as_deref(),
            Some("https://img/1.jpg")
        );
        assert_eq!(catalog.movie(3).unwrap().img_link, None);
        assert_eq!(catalog.movie(2).unwrap().img_link, None);
    }

    #[test]
    fn test_unlisted_movies_reports_mapping_gaps() {
        let dir = TempDir::new().unwrap();
        write_files(&dir);
        let catalog = load(&dir);

        assert!(catalog
            .unlisted_movies(&IdMapping::new(vec![1, 2, 3]).unwrap())
            .is_empty());
        assert_eq!(
            catalog.unlisted_movies(&IdMapping::new(vec![7, 1, 9]).unwrap()),
            vec![7, 9]
        );
    }

    #[test]
    fn test_user_ratings_and_unseen() {
        let dir = TempDir::new().unwrap();
        write_files(&dir);
        let catalog = load(&dir);

        assert!(catalog.has_user(1));
        assert!(!catalog.has_user(3));
        assert_eq!(catalog.user_ratings(1).len(), 2);
        assert!(catalog.user_ratings(3).is_empty());
        assert_eq!(catalog.unseen_movies(1), vec![2]);
        assert_eq!(catalog.unseen_movies(3), vec![1, 2, 3]);
        assert_eq!(catalog.all_ratings().count(), 3);
    }

    #[test]
    fn test_search_is_case_insensitive_and_sorted() {
        let dir = TempDir::new().unwrap();
        write_files(&dir);
        let catalog = load(&dir);

        let titles: Vec<&str> = catalog
            .search("(1995)", 10)
            .into_iter()
            .map(|m| m.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["Grumpier Old Men (1995)", "Jumanji (1995)", "Toy Story (1995)"]
        );

        assert_eq!(catalog.search("TOY", 10).len(), 1);
        assert_eq!(catalog.search("", 2).len(), 2);
        assert!(catalog.search("zzz", 10).is_empty());
    }

    #[test]
    fn test_latin1_titles_are_decoded() {
        let dir = TempDir::new().unwrap();
        write_files(&dir);
        let mut movies = b"movieId,title,genres\n1,".to_vec();
        movies.extend_from_slice(b"Ca\xe7a (1998),Drama\n");
        fs::write(dir.path().join("movies.csv"), movies).unwrap();

        let catalog = load(&dir);
        assert_eq!(catalog.movie(1).unwrap().title, "Caça (1998)");
    }

    #[test]
    fn test_missing_file_is_catalog_error() {
        let dir = TempDir::new().unwrap();
        let mapping = IdMapping::new(vec![1]).unwrap();
        let result = Catalog::load(
            &dir.path().join("missing.csv"),
            None,
            &dir.path().join("ratings.csv"),
            &mapping,
        );
        assert!(matches!(result, Err(crate::error::AppError::Catalog(_))));
    }
}

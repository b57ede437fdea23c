use crate::error::{AppError, AppResult};

pub const ACTORS_DIR: &str = "actors/";
pub const MOVIES_DIR: &str = "movies/";
pub const MOVIE_SHOTS_DIR: &str = "movie_shots/";

/// Normalises a path typed into a form to live under `dir`, relative to the media root.
pub fn upload_path(dir: &str, raw: &str) -> AppResult<String> {
    let raw = raw.trim().trim_start_matches('/');
    if raw.is_empty() {
        return Err(AppError::Validation("an image path is required".to_string()));
    }
    if raw.split('/').any(|part| part == ".." || part == ".") || raw.contains('\\') {
        return Err(AppError::Validation(format!("invalid image path: {raw}")));
    }

    if raw.starts_with(dir) { Ok(raw.to_string()) } else { Ok(format!("{dir}{raw}")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_upload_dir() {
        assert_eq!(upload_path(ACTORS_DIR, "keanu.jpg").unwrap(), "actors/keanu.jpg");
        assert_eq!(upload_path(MOVIES_DIR, "/movies/matrix.png").unwrap(), "movies/matrix.png");
        assert_eq!(
            upload_path(MOVIE_SHOTS_DIR, "matrix/lobby.jpg").unwrap(),
            "movie_shots/matrix/lobby.jpg"
        );
    }

    #[test]
    fn rejects_traversal_and_empty() {
        assert!(upload_path(ACTORS_DIR, "../etc/passwd").is_err());
        assert!(upload_path(ACTORS_DIR, "a/./b.jpg").is_err());
        assert!(upload_path(ACTORS_DIR, "   ").is_err());
    }
}

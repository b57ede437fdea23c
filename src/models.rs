use serde::Deserialize;

use crate::{
    entities::{actor, category, genre, movie, movie_shots, rating_star, reviews},
    error::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub votes: u64,
}

impl RatingSummary {
    /// Whole stars for display, rounded half up.
    pub fn stars(&self) -> i64 {
        self.average.round() as i64
    }
}

#[derive(Clone, Debug)]
pub struct ReviewThread {
    pub review: reviews::Model,
    pub replies: Vec<ReviewThread>,
}

#[derive(Clone, Debug)]
pub struct MovieDetail {
    pub movie: movie::Model,
    pub category: Option<category::Model>,
    pub directors: Vec<actor::Model>,
    pub actors: Vec<actor::Model>,
    pub genres: Vec<genre::Model>,
    pub shots: Vec<movie_shots::Model>,
    pub rating: Option<RatingSummary>,
    pub stars: Vec<rating_star::Model>,
    pub reviews: Vec<ReviewThread>,
}

#[derive(Clone, Debug)]
pub struct ActorDetail {
    pub actor: actor::Model,
    pub acted_in: Vec<movie::Model>,
    pub directed: Vec<movie::Model>,
}

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub email: String,
}

impl ContactForm {
    pub fn validate(self) -> AppResult<String> {
        let email = self.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AppError::Validation("enter a valid email address".to_string()));
        }
        Ok(email)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub name: String,
    pub email: String,
    pub text: String,
    #[serde(default)]
    pub parent: String,
}

#[derive(Debug)]
pub struct NewReview {
    pub name: String,
    pub email: String,
    pub text: String,
    pub parent_id: Option<i32>,
}

impl ReviewForm {
    pub fn validate(self) -> AppResult<NewReview> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_string();
        let text = self.text.trim().to_string();

        if name.is_empty() || name.chars().count() > reviews::NAME_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "name must be 1 to {} characters",
                reviews::NAME_MAX_CHARS
            )));
        }
        if !is_valid_email(&email) {
            return Err(AppError::Validation("enter a valid email address".to_string()));
        }
        if text.is_empty() || text.chars().count() > reviews::TEXT_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "message must be 1 to {} characters",
                reviews::TEXT_MAX_CHARS
            )));
        }

        let parent = self.parent.trim();
        let parent_id = if parent.is_empty() {
            None
        } else {
            Some(parent.parse().map_err(|_| AppError::Validation("invalid parent".to_string()))?)
        };

        Ok(NewReview { name, email, text, parent_id })
    }
}

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    pub star: i32,
    pub movie: i32,
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
}

/// Lowercase ASCII slug; runs of anything else collapse into a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("The Matrix: Reloaded"), "the-matrix-reloaded");
        assert_eq!(slugify("  Sci-Fi  "), "sci-fi");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn review_form_rejects_long_text() {
        let form = ReviewForm {
            name: "Neo".to_string(),
            email: "neo@zion.org".to_string(),
            text: "x".repeat(reviews::TEXT_MAX_CHARS + 1),
            parent: String::new(),
        };
        assert!(matches!(form.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn review_form_parses_parent() {
        let form = ReviewForm {
            name: "Neo".to_string(),
            email: "neo@zion.org".to_string(),
            text: "Whoa.".to_string(),
            parent: "7".to_string(),
        };
        assert_eq!(form.validate().unwrap().parent_id, Some(7));
    }

    #[test]
    fn email_check_is_loose() {
        assert!(is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
    }
}

//! Fixtures for tests that need rows in the database.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::entities::{actor, category, genre, movie, movie_shots, rating, rating_star, reviews};

pub async fn category(db: &DatabaseConnection, name: &str, url: &str) -> category::Model {
    category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        url: Set(url.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn genre(db: &DatabaseConnection, name: &str, url: &str) -> genre::Model {
    genre::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        url: Set(url.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn actor(db: &DatabaseConnection, name: &str) -> actor::Model {
    actor::ActiveModel {
        name: Set(name.to_string()),
        age: Set(40),
        description: Set(String::new()),
        image: Set(format!("actors/{name}.jpg")),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Inserts a draft movie.
pub async fn movie(
    db: &DatabaseConnection,
    title: &str,
    url: &str,
    category: Option<&category::Model>,
) -> movie::Model {
    movie::ActiveModel {
        title: Set(title.to_string()),
        tagline: Set(String::new()),
        description: Set(String::new()),
        poster: Set(format!("movies/{url}.jpg")),
        year: Set(1999),
        country: Set("USA".to_string()),
        world_premiere: Set("1999-03-31".to_string()),
        budget: Set(0),
        fees_in_usa: Set(0),
        fees_in_world: Set(0),
        category_id: Set(category.map(|c| c.id)),
        url: Set(url.to_string()),
        draft: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn published(db: &DatabaseConnection, title: &str, url: &str) -> movie::Model {
    let movie = movie(db, title, url, None).await;
    let mut active: movie::ActiveModel = movie.into();
    active.draft = Set(false);
    active.update(db).await.unwrap()
}

pub async fn shot(
    db: &DatabaseConnection,
    movie: &movie::Model,
    title: &str,
) -> movie_shots::Model {
    movie_shots::ActiveModel {
        title: Set(title.to_string()),
        description: Set(String::new()),
        image: Set(format!("movie_shots/{title}.jpg")),
        movie_id: Set(movie.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn star(db: &DatabaseConnection, value: i16) -> rating_star::Model {
    rating_star::ActiveModel { value: Set(value), ..Default::default() }.insert(db).await.unwrap()
}

pub async fn rating(
    db: &DatabaseConnection,
    ip: &str,
    star: &rating_star::Model,
    movie: &movie::Model,
) -> rating::Model {
    rating::ActiveModel {
        ip: Set(ip.to_string()),
        star_id: Set(star.id),
        movie_id: Set(movie.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn review(
    db: &DatabaseConnection,
    movie: &movie::Model,
    name: &str,
    parent: Option<&reviews::Model>,
) -> reviews::Model {
    reviews::ActiveModel {
        email: Set(format!("{}@example.com", name.to_lowercase())),
        name: Set(name.to_string()),
        text: Set(format!("{name} liked it")),
        parent_id: Set(parent.map(|p| p.id)),
        movie_id: Set(movie.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn state() -> std::sync::Arc<crate::AppState> {
    state_with(crate::config::Config::for_tests()).await
}

pub async fn state_with(config: crate::config::Config) -> std::sync::Arc<crate::AppState> {
    std::sync::Arc::new(crate::AppState {
        limiter: crate::limits::SubmissionLimiter::per_minute(config.submissions_per_minute),
        config: std::sync::Arc::new(config),
        catalog: crate::catalog::Catalog::new(crate::db::test_db().await),
    })
}

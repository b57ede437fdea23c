use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::debug;

use crate::{
    db::now_sec,
    entities::{
        actor, category, contact, genre, movie, movie_shots, rating, rating_star, reviews,
    },
    error::{AppError, AppResult},
    models::{ActorDetail, MovieDetail, NewReview, ReviewThread},
    tags,
};

/// Read side of the public site plus the three submissions visitors can make.
#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
}

/// What a movie listing is narrowed to.
#[derive(Clone, Copy, Debug)]
pub enum Listing<'a> {
    All,
    Category(&'a str),
    Genre(&'a str),
}

impl Catalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Published movies for a listing, with the heading to show above them.
    pub async fn movies(&self, listing: Listing<'_>) -> AppResult<(String, Vec<movie::Model>)> {
        let published = movie::Entity::find().filter(movie::Column::Draft.eq(false));

        let (heading, query) = match listing {
            Listing::All => ("Movies".to_string(), published),
            Listing::Category(url) => {
                // Category slugs may repeat; the oldest category owns the page.
                let category = category::Entity::find()
                    .filter(category::Column::Url.eq(url))
                    .order_by_asc(category::Column::Id)
                    .one(&self.db)
                    .await?
                    .ok_or(AppError::NotFound)?;
                let query = published.filter(movie::Column::CategoryId.eq(category.id));
                (category.name, query)
            },
            Listing::Genre(url) => {
                let genre = genre::Entity::find()
                    .filter(genre::Column::Url.eq(url))
                    .one(&self.db)
                    .await?
                    .ok_or(AppError::NotFound)?;
                let query =
                    genre.find_related(movie::Entity).filter(movie::Column::Draft.eq(false));
                (genre.name, query)
            },
        };

        let movies = query.order_by_asc(movie::Column::Title).all(&self.db).await?;
        Ok((heading, movies))
    }

    pub async fn movie_detail(&self, url: &str) -> AppResult<MovieDetail> {
        let movie = self.published_by_url(url).await?;

        let category = movie.find_related(category::Entity).one(&self.db).await?;
        let directors = movie
            .find_linked(movie::DirectorLink)
            .order_by_asc(actor::Column::Name)
            .all(&self.db)
            .await?;
        let actors = movie
            .find_related(actor::Entity)
            .order_by_asc(actor::Column::Name)
            .all(&self.db)
            .await?;
        let genres = movie
            .find_related(genre::Entity)
            .order_by_asc(genre::Column::Name)
            .all(&self.db)
            .await?;
        let shots = movie
            .find_related(movie_shots::Entity)
            .order_by_asc(movie_shots::Column::Id)
            .all(&self.db)
            .await?;
        let rating = tags::get_rating(&self.db, &movie).await?;
        let stars = rating_star::Entity::find()
            .order_by_desc(rating_star::Column::Value)
            .all(&self.db)
            .await?;
        let reviews = self.review_threads(&movie).await?;

        Ok(MovieDetail {
            movie,
            category,
            directors,
            actors,
            genres,
            shots,
            rating,
            stars,
            reviews,
        })
    }

    pub async fn actor_detail(&self, name: &str) -> AppResult<ActorDetail> {
        let actor = actor::Entity::find()
            .filter(actor::Column::Name.eq(name))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let acted_in = actor
            .find_related(movie::Entity)
            .filter(movie::Column::Draft.eq(false))
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await?;
        let directed = actor
            .find_linked(actor::DirectedLink)
            .filter(movie::Column::Draft.eq(false))
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await?;

        Ok(ActorDetail { actor, acted_in, directed })
    }

    /// Top-level reviews with their replies nested to any depth.
    pub async fn review_threads(&self, movie: &movie::Model) -> AppResult<Vec<ReviewThread>> {
        let roots = movie.get_review(&self.db).await?;

        let mut children: HashMap<i32, Vec<reviews::Model>> = HashMap::new();
        let replies = movie
            .find_related(reviews::Entity)
            .filter(reviews::Column::ParentId.is_not_null())
            .order_by_asc(reviews::Column::Id)
            .all(&self.db)
            .await?;
        for reply in replies {
            if let Some(parent_id) = reply.parent_id {
                children.entry(parent_id).or_default().push(reply);
            }
        }

        Ok(roots.into_iter().map(|review| thread(review, &mut children)).collect())
    }

    pub async fn add_review(&self, movie_id: i32, review: NewReview) -> AppResult<movie::Model> {
        let movie = self.published_by_id(movie_id).await?;

        if let Some(parent_id) = review.parent_id {
            let parent = reviews::Entity::find_by_id(parent_id).one(&self.db).await?;
            if parent.is_none_or(|p| p.movie_id != movie.id) {
                return Err(AppError::Validation("reply to a review of this movie".to_string()));
            }
        }

        let saved = reviews::ActiveModel {
            email: Set(review.email),
            name: Set(review.name),
            text: Set(review.text),
            parent_id: Set(review.parent_id),
            movie_id: Set(movie.id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        debug!(movie_id = movie.id, review_id = saved.id, "review added");
        Ok(movie)
    }

    /// Records a vote, replacing an earlier vote from the same ip on the same movie.
    pub async fn rate(&self, ip: &str, star_id: i32, movie_id: i32) -> AppResult<movie::Model> {
        let movie = self.published_by_id(movie_id).await?;
        let star = rating_star::Entity::find_by_id(star_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Validation("unknown rating star".to_string()))?;

        let existing = rating::Entity::find()
            .filter(rating::Column::MovieId.eq(movie.id))
            .filter(rating::Column::Ip.eq(ip))
            .order_by_asc(rating::Column::Id)
            .one(&self.db)
            .await?;

        match existing {
            Some(vote) => {
                let mut vote: rating::ActiveModel = vote.into();
                vote.star_id = Set(star.id);
                vote.update(&self.db).await?;
            },
            None => {
                rating::ActiveModel {
                    ip: Set(ip.to_string()),
                    star_id: Set(star.id),
                    movie_id: Set(movie.id),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?;
            },
        }

        debug!(movie_id = movie.id, star = star.value, "vote recorded");
        Ok(movie)
    }

    pub async fn add_contact(&self, email: String) -> AppResult<contact::Model> {
        let saved = contact::ActiveModel {
            email: Set(email),
            date: Set(now_sec()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        debug!(contact_id = saved.id, "contact saved");
        Ok(saved)
    }

    async fn published_by_url(&self, url: &str) -> AppResult<movie::Model> {
        movie::Entity::find()
            .filter(movie::Column::Url.eq(url))
            .filter(movie::Column::Draft.eq(false))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn published_by_id(&self, id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(id)
            .filter(movie::Column::Draft.eq(false))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }
}

fn thread(
    review: reviews::Model,
    children: &mut HashMap<i32, Vec<reviews::Model>>,
) -> ReviewThread {
    let replies = children
        .remove(&review.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| thread(reply, children))
        .collect();
    ReviewThread { review, replies }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{
        db::test_db,
        entities::{movie_actor, movie_director, movie_genre},
        testing,
    };

    #[tokio::test]
    async fn deleting_category_nulls_movie_reference() {
        let db = test_db().await;
        let films = testing::category(&db, "Films", "films").await;
        let movie = testing::movie(&db, "Heat", "heat", Some(&films)).await;

        films.delete(&db).await.unwrap();

        let movie = movie::Entity::find_by_id(movie.id).one(&db).await.unwrap().unwrap();
        assert_eq!(movie.category_id, None);
    }

    #[tokio::test]
    async fn deleting_movie_cascades_to_dependents() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let star = testing::star(&db, 5).await;
        let actor = testing::actor(&db, "Pacino").await;
        let genre = testing::genre(&db, "Crime", "crime").await;
        testing::shot(&db, &movie, "diner").await;
        testing::rating(&db, "10.0.0.1", &star, &movie).await;
        let root = testing::review(&db, &movie, "Ann", None).await;
        testing::review(&db, &movie, "Bob", Some(&root)).await;
        movie_actor::ActiveModel { movie_id: Set(movie.id), actor_id: Set(actor.id) }
            .insert(&db)
            .await
            .unwrap();
        movie_director::ActiveModel { movie_id: Set(movie.id), actor_id: Set(actor.id) }
            .insert(&db)
            .await
            .unwrap();
        movie_genre::ActiveModel { movie_id: Set(movie.id), genre_id: Set(genre.id) }
            .insert(&db)
            .await
            .unwrap();

        movie.delete(&db).await.unwrap();

        assert_eq!(movie_shots::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(rating::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(reviews::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(movie_actor::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(movie_director::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(movie_genre::Entity::find().count(&db).await.unwrap(), 0);
        // Shared rows survive.
        assert_eq!(actor::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(rating_star::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_review_returns_only_top_level() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let root = testing::review(&db, &movie, "Ann", None).await;
        let reply = testing::review(&db, &movie, "Bob", Some(&root)).await;

        let top: Vec<i32> = movie.get_review(&db).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(top, [root.id]);

        let replies = root.get_replies(&db).await.unwrap();
        assert_eq!(replies, [reply]);
    }

    #[tokio::test]
    async fn deleting_parent_review_removes_replies() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let root = testing::review(&db, &movie, "Ann", None).await;
        let reply = testing::review(&db, &movie, "Bob", Some(&root)).await;
        testing::review(&db, &movie, "Cid", Some(&reply)).await;
        let other = testing::review(&db, &movie, "Dee", None).await;

        root.delete(&db).await.unwrap();

        let left: Vec<i32> =
            reviews::Entity::find().all(&db).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(left, [other.id]);
    }

    #[tokio::test]
    async fn review_threads_nest_replies() {
        let db = test_db().await;
        let movie = testing::published(&db, "Heat", "heat").await;
        let root = testing::review(&db, &movie, "Ann", None).await;
        let reply = testing::review(&db, &movie, "Bob", Some(&root)).await;
        testing::review(&db, &movie, "Cid", Some(&reply)).await;

        let catalog = Catalog::new(db);
        let threads = catalog.review_threads(&movie).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies[0].review.name, "Bob");
        assert_eq!(threads[0].replies[0].replies[0].review.name, "Cid");
    }

    #[tokio::test]
    async fn movie_detail_hides_drafts_and_splits_roles() {
        let db = test_db().await;
        testing::movie(&db, "Draft", "draft", None).await;
        let heat = testing::published(&db, "Heat", "heat").await;
        let mann = testing::actor(&db, "Mann").await;
        let pacino = testing::actor(&db, "Pacino").await;
        movie_director::ActiveModel { movie_id: Set(heat.id), actor_id: Set(mann.id) }
            .insert(&db)
            .await
            .unwrap();
        movie_actor::ActiveModel { movie_id: Set(heat.id), actor_id: Set(pacino.id) }
            .insert(&db)
            .await
            .unwrap();

        let catalog = Catalog::new(db);
        assert!(matches!(catalog.movie_detail("draft").await, Err(AppError::NotFound)));

        let detail = catalog.movie_detail("heat").await.unwrap();
        assert_eq!(detail.directors, [mann.clone()]);
        assert_eq!(detail.actors, [pacino]);

        let mann = catalog.actor_detail("Mann").await.unwrap();
        assert!(mann.acted_in.is_empty());
        assert_eq!(mann.directed, [heat]);
    }

    #[tokio::test]
    async fn shared_category_slug_lists_one_category() {
        let db = test_db().await;
        let films = testing::category(&db, "Films", "films").await;
        let shorts = testing::category(&db, "Shorts", "films").await;
        let heat = testing::published(&db, "Heat", "heat").await;
        let alien = testing::published(&db, "Alien", "alien").await;

        for (movie, category) in [(heat.clone(), &films), (alien, &shorts)] {
            let mut active: movie::ActiveModel = movie.into();
            active.category_id = Set(Some(category.id));
            active.update(&db).await.unwrap();
        }

        let catalog = Catalog::new(db);
        let (heading, movies) = catalog.movies(Listing::Category("films")).await.unwrap();
        assert_eq!(heading, "Films");
        assert_eq!(movies.iter().map(|m| m.id).collect::<Vec<_>>(), [heat.id]);
    }

    #[tokio::test]
    async fn listings_filter_by_category_and_genre() {
        let db = test_db().await;
        let films = testing::category(&db, "Films", "films").await;
        let crime = testing::genre(&db, "Crime", "crime").await;
        let heat = testing::published(&db, "Heat", "heat").await;
        testing::published(&db, "Alien", "alien").await;

        let mut active: movie::ActiveModel = heat.clone().into();
        active.category_id = Set(Some(films.id));
        let heat = active.update(&db).await.unwrap();
        movie_genre::ActiveModel { movie_id: Set(heat.id), genre_id: Set(crime.id) }
            .insert(&db)
            .await
            .unwrap();

        let catalog = Catalog::new(db);
        let (_, all) = catalog.movies(Listing::All).await.unwrap();
        assert_eq!(all.iter().map(|m| m.title.as_str()).collect::<Vec<_>>(), ["Alien", "Heat"]);

        let (heading, by_category) = catalog.movies(Listing::Category("films")).await.unwrap();
        assert_eq!(heading, "Films");
        assert_eq!(by_category, [heat.clone()]);

        let (_, by_genre) = catalog.movies(Listing::Genre("crime")).await.unwrap();
        assert_eq!(by_genre, [heat]);

        assert!(matches!(catalog.movies(Listing::Genre("nope")).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn repeat_vote_from_same_ip_updates() {
        let db = test_db().await;
        let movie = testing::published(&db, "Heat", "heat").await;
        let three = testing::star(&db, 3).await;
        let five = testing::star(&db, 5).await;

        let catalog = Catalog::new(db);
        catalog.rate("10.0.0.1", three.id, movie.id).await.unwrap();
        catalog.rate("10.0.0.1", five.id, movie.id).await.unwrap();
        catalog.rate("10.0.0.2", three.id, movie.id).await.unwrap();

        let summary = tags::get_rating(catalog.db(), &movie).await.unwrap().unwrap();
        assert_eq!(summary.votes, 2);
        assert!((summary.average - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn reply_must_target_same_movie() {
        let db = test_db().await;
        let heat = testing::published(&db, "Heat", "heat").await;
        let alien = testing::published(&db, "Alien", "alien").await;
        let elsewhere = testing::review(&db, &alien, "Ann", None).await;

        let catalog = Catalog::new(db);
        let review = NewReview {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            text: "Agreed".to_string(),
            parent_id: Some(elsewhere.id),
        };
        assert!(matches!(catalog.add_review(heat.id, review).await, Err(AppError::Validation(_))));
    }
}

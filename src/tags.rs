use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::{
    entities::{category, movie, rating, rating_star},
    models::RatingSummary,
};

pub const LAST_MOVIES_COUNT: u64 = 5;

pub async fn get_categories<C: ConnectionTrait>(db: &C) -> Result<Vec<category::Model>, DbErr> {
    category::Entity::find().order_by_asc(category::Column::Name).all(db).await
}

/// Mean star value over every vote on `movie`, or `None` when nobody voted.
///
/// Repeat votes from one ip are all counted: the table does not enforce one vote per
/// `(ip, movie)`, only the public vote endpoint does.
pub async fn get_rating<C: ConnectionTrait>(
    db: &C,
    movie: &movie::Model,
) -> Result<Option<RatingSummary>, DbErr> {
    let rows = rating::Entity::find()
        .filter(rating::Column::MovieId.eq(movie.id))
        .find_also_related(rating_star::Entity)
        .all(db)
        .await?;

    let values: Vec<i64> =
        rows.into_iter().filter_map(|(_, star)| star.map(|s| i64::from(s.value))).collect();
    if values.is_empty() {
        return Ok(None);
    }

    let votes = values.len() as u64;
    let average = values.iter().sum::<i64>() as f64 / votes as f64;
    Ok(Some(RatingSummary { average, votes }))
}

/// The `count` most recently added movies, oldest of them first.
pub async fn get_last_movies<C: ConnectionTrait>(
    db: &C,
    count: u64,
) -> Result<Vec<movie::Model>, DbErr> {
    let mut movies =
        movie::Entity::find().order_by_desc(movie::Column::Id).limit(count).all(db).await?;
    movies.reverse();
    Ok(movies)
}

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::{db::test_db, testing};

    #[tokio::test]
    async fn categories_are_ordered_by_name() {
        let db = test_db().await;
        testing::category(&db, "Series", "series").await;
        testing::category(&db, "Cartoons", "cartoons").await;
        testing::category(&db, "Films", "films").await;

        let names: Vec<String> =
            get_categories(&db).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Cartoons", "Films", "Series"]);
    }

    #[tokio::test]
    async fn last_movies_keep_insertion_order_after_edits() {
        let db = test_db().await;
        let a = testing::movie(&db, "A", "a", None).await;
        let b = testing::movie(&db, "B", "b", None).await;
        let c = testing::movie(&db, "C", "c", None).await;

        let mut renamed: movie::ActiveModel = a.clone().into();
        renamed.title = Set("Zzz".to_string());
        renamed.update(&db).await.unwrap();

        let ids: Vec<i32> = get_last_movies(&db, 3).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, [a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn last_movies_returns_newest() {
        let db = test_db().await;
        let mut ids = Vec::new();
        for i in 0..7 {
            ids.push(testing::movie(&db, &format!("M{i}"), &format!("m{i}"), None).await.id);
        }

        let got: Vec<i32> =
            get_last_movies(&db, LAST_MOVIES_COUNT).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(got, ids[2..]);
    }

    #[tokio::test]
    async fn rating_is_none_without_votes() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        assert_eq!(get_rating(&db, &movie).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_votes_are_stored_and_averaged() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let four = testing::star(&db, 4).await;
        let five = testing::star(&db, 5).await;

        testing::rating(&db, "10.0.0.1", &four, &movie).await;
        testing::rating(&db, "10.0.0.1", &five, &movie).await;

        let summary = get_rating(&db, &movie).await.unwrap().unwrap();
        assert_eq!(summary.votes, 2);
        assert!((summary.average - 4.5).abs() < f64::EPSILON);
    }
}

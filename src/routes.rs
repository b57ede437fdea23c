use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, Path, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState, admin,
    catalog::Listing,
    error::AppResult,
    limits::ClientIp,
    models::{ContactForm, RatingForm, ReviewForm},
    tags,
    templates::{self, Sidebar},
};

pub fn router(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .route("/", get(index))
        .route("/category/{url}/", get(category))
        .route("/genre/{url}/", get(genre))
        .route("/movie/{url}/", get(movie_detail))
        .route("/actor/{name}/", get(actor_detail))
        .route("/review/{movie_id}/", post(add_review))
        .route("/add-rating/", post(add_rating))
        .route("/contact/", post(contact))
        .merge(admin::router(state.clone()))
        .nest_service("/media", media)
        .with_state(state)
}

pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    listing(&state, Listing::All).await
}

pub async fn category(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
) -> AppResult<Html<String>> {
    listing(&state, Listing::Category(&url)).await
}

pub async fn genre(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
) -> AppResult<Html<String>> {
    listing(&state, Listing::Genre(&url)).await
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
) -> AppResult<Html<String>> {
    let detail = state.catalog.movie_detail(&url).await?;
    let sidebar = sidebar(&state).await?;
    Ok(Html(templates::movie_page(&state.config, &detail, &sidebar)))
}

pub async fn actor_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Html<String>> {
    let detail = state.catalog.actor_detail(&name).await?;
    let sidebar = sidebar(&state).await?;
    Ok(Html(templates::actor_page(&state.config, &detail, &sidebar)))
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    ip: ClientIp,
    Path(movie_id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    state.limiter.check(&ip)?;
    let review = form.validate()?;
    let movie = state.catalog.add_review(movie_id, review).await?;
    Ok(Redirect::to(&movie.get_absolute_url()))
}

pub async fn add_rating(
    State(state): State<Arc<AppState>>,
    ip: ClientIp,
    Form(form): Form<RatingForm>,
) -> AppResult<Redirect> {
    state.limiter.check(&ip)?;
    let movie = state.catalog.rate(&ip.0, form.star, form.movie).await?;
    Ok(Redirect::to(&movie.get_absolute_url()))
}

pub async fn contact(
    State(state): State<Arc<AppState>>,
    ip: ClientIp,
    Form(form): Form<ContactForm>,
) -> AppResult<Redirect> {
    state.limiter.check(&ip)?;
    let email = form.validate()?;
    state.catalog.add_contact(email).await?;
    Ok(Redirect::to("/"))
}

async fn listing(state: &AppState, listing: Listing<'_>) -> AppResult<Html<String>> {
    let (heading, movies) = state.catalog.movies(listing).await?;
    let sidebar = sidebar(state).await?;
    Ok(Html(templates::movie_list_page(&state.config, &heading, &movies, &sidebar)))
}

async fn sidebar(state: &AppState) -> AppResult<Sidebar> {
    let db = state.catalog.db();
    let categories = tags::get_categories(db).await?;
    let mut last_movies = tags::get_last_movies(db, tags::LAST_MOVIES_COUNT).await?;
    // Drafts have no public page to link to.
    last_movies.retain(|m| !m.draft);
    Ok(Sidebar { categories, last_movies })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use sea_orm::{EntityTrait, PaginatorTrait};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        entities::{contact, rating, reviews},
        testing,
    };

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", "203.0.113.5")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn contact_creates_one_record_and_redirects_home() {
        let state = testing::state().await;
        let app = router(state.clone());

        let resp = app.oneshot(form_post("/contact/", "email=viewer%40example.com")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
        let saved = contact::Entity::find().all(state.catalog.db()).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].email, "viewer@example.com");
    }

    #[tokio::test]
    async fn contact_rejects_invalid_email() {
        let state = testing::state().await;
        let resp =
            router(state.clone()).oneshot(form_post("/contact/", "email=nope")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(contact::Entity::find().count(state.catalog.db()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn index_lists_published_movies_and_sidebar() {
        let state = testing::state().await;
        let db = state.catalog.db();
        testing::category(db, "Cartoons", "cartoons").await;
        testing::published(db, "Heat", "heat").await;
        testing::movie(db, "Secret Draft", "secret", None).await;

        let resp = router(state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("Heat"));
        assert!(html.contains("Cartoons"));
        assert!(!html.contains("Secret Draft"));
    }

    #[tokio::test]
    async fn movie_page_shows_rating_and_reviews() {
        let state = testing::state().await;
        let db = state.catalog.db();
        let heat = testing::published(db, "Heat", "heat").await;
        let star = testing::star(db, 5).await;
        testing::rating(db, "10.0.0.1", &star, &heat).await;
        testing::review(db, &heat, "Ann", None).await;

        let resp = router(state.clone())
            .oneshot(Request::builder().uri("/movie/heat/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("Rating 5.0"));
        assert!(html.contains("Ann liked it"));
    }

    #[tokio::test]
    async fn unknown_movie_is_not_found() {
        let state = testing::state().await;
        let resp = router(state)
            .oneshot(Request::builder().uri("/movie/missing/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn review_post_redirects_to_movie() {
        let state = testing::state().await;
        let heat = testing::published(state.catalog.db(), "Heat", "heat").await;

        let resp = router(state.clone())
            .oneshot(form_post(
                &format!("/review/{}/", heat.id),
                "name=Ann&email=ann%40example.com&text=Great+heist&parent=",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/movie/heat/");
        let saved = reviews::Entity::find().all(state.catalog.db()).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].parent_id, None);
    }

    #[tokio::test]
    async fn rating_post_records_client_ip() {
        let state = testing::state().await;
        let db = state.catalog.db();
        let heat = testing::published(db, "Heat", "heat").await;
        let star = testing::star(db, 4).await;

        let resp = router(state.clone())
            .oneshot(form_post("/add-rating/", &format!("star={}&movie={}", star.id, heat.id)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let votes = rating::Entity::find().all(state.catalog.db()).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].ip, "203.0.113.5");
    }

    #[tokio::test]
    async fn submissions_are_rate_limited() {
        let mut state = testing::state().await;
        Arc::get_mut(&mut state).unwrap().limiter = crate::limits::SubmissionLimiter::per_minute(1);

        let first =
            router(state.clone()).oneshot(form_post("/contact/", "email=a%40b.c")).await.unwrap();
        let second =
            router(state.clone()).oneshot(form_post("/contact/", "email=a%40b.c")).await.unwrap();

        assert_eq!(first.status(), StatusCode::SEE_OTHER);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn forwarded_header_ignored_without_trusted_proxy() {
        let mut config = crate::config::Config::for_tests();
        config.trust_proxy = false;
        config.submissions_per_minute = 1;
        let state = testing::state_with(config).await;

        let mut first = form_post("/contact/", "email=a%40b.c");
        first.headers_mut().insert("x-forwarded-for", "198.51.100.1".parse().unwrap());
        let mut second = form_post("/contact/", "email=a%40b.c");
        second.headers_mut().insert("x-forwarded-for", "198.51.100.2".parse().unwrap());

        let first = router(state.clone()).oneshot(first).await.unwrap();
        let second = router(state.clone()).oneshot(second).await.unwrap();

        assert_eq!(first.status(), StatusCode::SEE_OTHER);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(contact::Entity::find().count(state.catalog.db()).await.unwrap(), 1);
    }
}

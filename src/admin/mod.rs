//! Hand-built administrative interface.
//!
//! Each entity is registered with a [`ModelAdmin`] describing which columns the change
//! list shows, what can be searched, filtered and edited in place, and which fields are
//! read only. The handlers in this module stay generic over [`ModelKind`]; entity specific
//! queries live in `changelist` and `forms`.

mod changelist;
mod forms;
mod pages;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, Path, Query, Request, State},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use maud::{Markup, html};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Deserialize;
use sha2::Sha256;
use tracing::info;

use crate::{
    AppState,
    config::Config,
    entities::{actor, movie},
    error::{AppError, AppResult},
};

pub use changelist::ListQuery;
pub use forms::FormData;

const SESSION_COOKIE: &str = "admin_session";
const SESSION_CONTEXT: &[u8] = b"movies admin session v1";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModelKind {
    Category,
    Movie,
    Reviews,
    Actor,
    Genre,
    MovieShots,
    RatingStar,
    Rating,
    Contact,
}

impl ModelKind {
    pub const ALL: [ModelKind; 9] = [
        ModelKind::Actor,
        ModelKind::Category,
        ModelKind::Contact,
        ModelKind::Genre,
        ModelKind::Movie,
        ModelKind::MovieShots,
        ModelKind::Rating,
        ModelKind::RatingStar,
        ModelKind::Reviews,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ModelKind::Category => "category",
            ModelKind::Movie => "movie",
            ModelKind::Reviews => "reviews",
            ModelKind::Actor => "actor",
            ModelKind::Genre => "genre",
            ModelKind::MovieShots => "movieshots",
            ModelKind::RatingStar => "ratingstar",
            ModelKind::Rating => "rating",
            ModelKind::Contact => "contact",
        }
    }

    pub fn from_slug(slug: &str) -> AppResult<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug).ok_or(AppError::NotFound)
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            ModelKind::Category => "Category",
            ModelKind::Movie => "Movie",
            ModelKind::Reviews => "Review",
            ModelKind::Actor => "Actor or director",
            ModelKind::Genre => "Genre",
            ModelKind::MovieShots => "Movie shot",
            ModelKind::RatingStar => "Rating star",
            ModelKind::Rating => "Rating",
            ModelKind::Contact => "Contact",
        }
    }

    pub fn verbose_name_plural(self) -> &'static str {
        match self {
            ModelKind::Category => "Categories",
            ModelKind::Movie => "Movies",
            ModelKind::Reviews => "Reviews",
            ModelKind::Actor => "Actors and directors",
            ModelKind::Genre => "Genres",
            ModelKind::MovieShots => "Movie shots",
            ModelKind::RatingStar => "Rating stars",
            ModelKind::Rating => "Ratings",
            ModelKind::Contact => "Contacts",
        }
    }

    pub fn admin(self) -> &'static ModelAdmin {
        match self {
            ModelKind::Category => &CATEGORY_ADMIN,
            ModelKind::Movie => &MOVIE_ADMIN,
            ModelKind::Reviews => &REVIEWS_ADMIN,
            ModelKind::Actor => &ACTOR_ADMIN,
            ModelKind::Genre => &GENRE_ADMIN,
            ModelKind::MovieShots => &MOVIE_SHOTS_ADMIN,
            ModelKind::RatingStar => &RATING_STAR_ADMIN,
            ModelKind::Rating => &RATING_ADMIN,
            ModelKind::Contact => &CONTACT_ADMIN,
        }
    }

    fn list_url(self) -> String {
        format!("/admin/{}/", self.slug())
    }

    fn change_url(self, id: i32) -> String {
        format!("/admin/{}/{id}/change/", self.slug())
    }
}

/// Display options for one registered entity.
#[derive(Debug)]
pub struct ModelAdmin {
    pub kind: ModelKind,
    /// `"__str__"` shows the entity's display string.
    pub list_display: &'static [&'static str],
    pub list_display_links: &'static [&'static str],
    pub list_filter: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    pub list_editable: &'static [&'static str],
    pub readonly_fields: &'static [&'static str],
    /// Reviews edited inline on the change page, with this many blank rows.
    pub review_inline_extra: Option<usize>,
    pub save_on_top: bool,
    pub save_as: bool,
    pub save_as_continue: bool,
}

impl ModelAdmin {
    const fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            list_display: &["__str__"],
            list_display_links: &[],
            list_filter: &[],
            search_fields: &[],
            list_editable: &[],
            readonly_fields: &[],
            review_inline_extra: None,
            save_on_top: true,
            save_as: true,
            save_as_continue: true,
        }
    }

    /// Column rendered as the link to the change page.
    pub fn link_column(&self) -> usize {
        self.list_display_links
            .first()
            .and_then(|link| self.list_display.iter().position(|c| c == link))
            .unwrap_or(0)
    }

    pub fn is_readonly(&self, field: &str) -> bool {
        self.readonly_fields.contains(&field)
    }
}

pub static CATEGORY_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["pk", "name", "url"],
    list_display_links: &["name"],
    ..ModelAdmin::new(ModelKind::Category)
};

pub static MOVIE_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["pk", "title", "category", "url", "draft"],
    list_display_links: &["title"],
    list_filter: &["category", "year"],
    search_fields: &["title", "category__name"],
    list_editable: &["draft"],
    review_inline_extra: Some(1),
    ..ModelAdmin::new(ModelKind::Movie)
};

pub static REVIEWS_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["pk", "name", "email", "parent", "movie"],
    readonly_fields: &["name", "email"],
    ..ModelAdmin::new(ModelKind::Reviews)
};

pub static ACTOR_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["name", "age", "get_image"],
    readonly_fields: &["get_image"],
    ..ModelAdmin::new(ModelKind::Actor)
};

pub static GENRE_ADMIN: ModelAdmin = ModelAdmin::new(ModelKind::Genre);
pub static MOVIE_SHOTS_ADMIN: ModelAdmin = ModelAdmin::new(ModelKind::MovieShots);
pub static RATING_STAR_ADMIN: ModelAdmin = ModelAdmin::new(ModelKind::RatingStar);
pub static CONTACT_ADMIN: ModelAdmin = ModelAdmin::new(ModelKind::Contact);

pub static RATING_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["pk", "movie", "ip", "star"],
    list_display_links: &["movie"],
    ..ModelAdmin::new(ModelKind::Rating)
};

/// Column header for a `list_display` entry.
pub fn column_label(kind: ModelKind, field: &str) -> String {
    match field {
        "__str__" => kind.verbose_name().to_string(),
        "pk" => "ID".to_string(),
        "get_image" => "Image".to_string(),
        other => {
            let mut label = other.replace('_', " ");
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            label
        },
    }
}

/// Thumbnail shown for an actor in the change list and on the change page.
pub fn get_image(cfg: &Config, actor: &actor::Model) -> Markup {
    html! { img src=(cfg.media(&actor.image)) width="50" height="60"; }
}

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/admin/", get(index))
        .route("/admin/logout/", post(logout))
        .route("/admin/{model}/", get(change_list))
        .route("/admin/{model}/add/", get(add_form).post(add))
        .route("/admin/{model}/{id}/change/", get(change_form).post(change))
        .route("/admin/{model}/{id}/delete/", post(delete))
        .route("/admin/movie/{id}/draft/", post(toggle_draft))
        .route("/admin/movie/{id}/reviews/", post(add_inline_review))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .route("/admin", get(|| async { Redirect::permanent("/admin/") }))
        .route("/admin/login/", get(login_form).post(login))
        .merge(protected)
}

async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    if is_authenticated(&state.config, &jar) {
        next.run(req).await
    } else {
        AppError::Unauthorized.into_response()
    }
}

/// MAC of a fixed context keyed by `token`; the cookie carries it instead of the token.
fn session_mac(token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(token.as_bytes()).ok()?;
    mac.update(SESSION_CONTEXT);
    Some(mac)
}

/// Constant-time check of `digest` against the session MAC of the configured token.
fn matches_token(cfg: &Config, digest: &[u8]) -> bool {
    let token = cfg.admin_token.trim();
    !token.is_empty() && session_mac(token).is_some_and(|mac| mac.verify_slice(digest).is_ok())
}

fn is_authenticated(cfg: &Config, jar: &CookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .and_then(|c| hex::decode(c.value()).ok())
        .is_some_and(|digest| matches_token(cfg, &digest))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    token: String,
}

async fn login_form(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(pages::login(&state.config, None))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let submitted = session_mac(form.token.trim()).map(|mac| mac.finalize().into_bytes());
    let session = match submitted {
        Some(digest) if matches_token(&state.config, &digest) => hex::encode(digest),
        _ => {
            tracing::warn!("admin login failed");
            let page = pages::login(&state.config, Some("Wrong token."));
            return (axum::http::StatusCode::UNAUTHORIZED, Html(page)).into_response();
        },
    };

    let cookie = Cookie::build((SESSION_COOKIE, session))
        .path("/admin")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(7));
    info!("admin logged in");
    (jar.add(cookie), Redirect::to("/admin/")).into_response()
}

async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(Cookie::build(SESSION_COOKIE).path("/admin")), Redirect::to("/admin/login/"))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(pages::index(&state.config))
}

async fn change_list(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Html<String>> {
    let kind = ModelKind::from_slug(&model)?;
    let db = state.catalog.db();
    let rows = changelist::rows(db, &state.config, kind, &query).await?;
    let filters = changelist::filters(db, kind.admin()).await?;
    Ok(Html(pages::change_list(&state.config, kind.admin(), &rows, &query, &filters)))
}

async fn add_form(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> AppResult<Html<String>> {
    let kind = ModelKind::from_slug(&model)?;
    let fieldsets = forms::fieldsets(state.catalog.db(), &state.config, kind, None).await?;
    Ok(Html(pages::change_form(&state.config, kind.admin(), None, &fieldsets, None)))
}

async fn add(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    Form(data): Form<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let kind = ModelKind::from_slug(&model)?;
    let data = FormData::new(data);
    let id = forms::save(state.catalog.db(), kind, forms::SaveTarget::Create, &data).await?;
    info!(model = kind.slug(), id, "created");
    Ok(after_save(kind, id, &data))
}

async fn change_form(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, i32)>,
) -> AppResult<Html<String>> {
    let kind = ModelKind::from_slug(&model)?;
    let db = state.catalog.db();
    let fieldsets = forms::fieldsets(db, &state.config, kind, Some(id)).await?;

    let inline = match kind.admin().review_inline_extra {
        Some(extra) if kind == ModelKind::Movie => {
            let movie = movie::Entity::find_by_id(id).one(db).await?.ok_or(AppError::NotFound)?;
            let reviews = changelist::movie_reviews(db, &movie).await?;
            Some(pages::review_inline(&movie, &reviews, extra))
        },
        _ => None,
    };

    Ok(Html(pages::change_form(&state.config, kind.admin(), Some(id), &fieldsets, inline)))
}

async fn change(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, i32)>,
    Form(data): Form<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let kind = ModelKind::from_slug(&model)?;
    let data = FormData::new(data);

    let target = if data.has("_saveasnew") && kind.admin().save_as {
        forms::SaveTarget::CopyOf(id)
    } else {
        forms::SaveTarget::Update(id)
    };
    let saved = forms::save(state.catalog.db(), kind, target, &data).await?;
    info!(model = kind.slug(), id = saved, "saved");

    if matches!(target, forms::SaveTarget::CopyOf(_)) && kind.admin().save_as_continue {
        return Ok(Redirect::to(&kind.change_url(saved)));
    }
    Ok(after_save(kind, saved, &data))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, i32)>,
    Form(data): Form<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let kind = ModelKind::from_slug(&model)?;
    forms::delete(state.catalog.db(), kind, id).await?;
    info!(model = kind.slug(), id, "deleted");

    let data = FormData::new(data);
    let next = data.get("next");
    if next.starts_with("/admin/") {
        return Ok(Redirect::to(next));
    }
    Ok(Redirect::to(&kind.list_url()))
}

async fn toggle_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    let db = state.catalog.db();
    let movie = movie::Entity::find_by_id(id).one(db).await?.ok_or(AppError::NotFound)?;

    let draft = !movie.draft;
    let mut active: movie::ActiveModel = movie.into();
    active.draft = Set(draft);
    active.update(db).await?;
    info!(movie_id = id, draft, "draft toggled");

    Ok(Redirect::to(&ModelKind::Movie.list_url()))
}

async fn add_inline_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Form(data): Form<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let data = FormData::new(data).with("movie", id.to_string());
    let review_id =
        forms::save(state.catalog.db(), ModelKind::Reviews, forms::SaveTarget::Create, &data)
            .await?;
    info!(movie_id = id, review_id, "inline review added");
    Ok(Redirect::to(&ModelKind::Movie.change_url(id)))
}

fn after_save(kind: ModelKind, id: i32, data: &FormData) -> Redirect {
    if data.has("_continue") {
        Redirect::to(&kind.change_url(id))
    } else if data.has("_addanother") {
        Redirect::to(&format!("/admin/{}/add/", kind.slug()))
    } else {
        Redirect::to(&kind.list_url())
    }
}

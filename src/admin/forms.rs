use std::str::FromStr;

use maud::{Markup, html};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PrimaryKeyTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::{ModelKind, changelist::review_label, get_image};
use crate::{
    config::Config,
    db::now_sec,
    entities::{
        actor, category, contact, genre, movie, movie_actor, movie_director, movie_genre,
        movie_shots, rating, rating_star, reviews,
    },
    error::{AppError, AppResult},
    media,
    models::{is_valid_email, slugify},
};

/// Submitted form fields in order; repeated names carry multi-select values.
#[derive(Clone, Debug, Default)]
pub struct FormData(Vec<(String, String)>);

impl FormData {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn with(mut self, name: &str, value: String) -> Self {
        self.0.retain(|(k, _)| k != name);
        self.0.push((name.to_string(), value));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> &str {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.trim()).unwrap_or("")
    }

    fn text(&self, name: &str, label: &str, max: usize) -> AppResult<String> {
        let value = self.optional_text(name, label, max)?;
        if value.is_empty() {
            return Err(invalid(format!("{label}: this field is required")));
        }
        Ok(value)
    }

    fn optional_text(&self, name: &str, label: &str, max: usize) -> AppResult<String> {
        let value = self.get(name);
        if value.chars().count() > max {
            return Err(invalid(format!("{label}: at most {max} characters")));
        }
        Ok(value.to_string())
    }

    fn number<T: FromStr>(&self, name: &str, label: &str) -> AppResult<T> {
        self.get(name).parse().map_err(|_| invalid(format!("{label}: enter a whole number")))
    }

    fn non_negative<T: FromStr + PartialOrd + Default>(
        &self,
        name: &str,
        label: &str,
    ) -> AppResult<T> {
        let value: T = self.number(name, label)?;
        if value < T::default() {
            return Err(invalid(format!("{label}: must not be negative")));
        }
        Ok(value)
    }

    fn checkbox(&self, name: &str) -> bool {
        matches!(self.get(name), "on" | "true" | "1")
    }

    fn optional_id(&self, name: &str, label: &str) -> AppResult<Option<i32>> {
        match self.get(name) {
            "" => Ok(None),
            raw => raw.parse().map(Some).map_err(|_| invalid(format!("{label}: invalid choice"))),
        }
    }

    fn id(&self, name: &str, label: &str) -> AppResult<i32> {
        self.optional_id(name, label)?
            .ok_or_else(|| invalid(format!("{label}: this field is required")))
    }

    fn ids(&self, name: &str, label: &str) -> AppResult<Vec<i32>> {
        let mut ids = self
            .0
            .iter()
            .filter(|(k, v)| k == name && !v.trim().is_empty())
            .map(|(_, v)| v.trim().parse().map_err(|_| invalid(format!("{label}: invalid choice"))))
            .collect::<AppResult<Vec<i32>>>()?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn date(&self, name: &str, label: &str) -> AppResult<String> {
        let date: jiff::civil::Date = self
            .get(name)
            .parse()
            .map_err(|_| invalid(format!("{label}: enter a date as YYYY-MM-DD")))?;
        Ok(date.to_string())
    }

    fn email(&self, name: &str, label: &str) -> AppResult<String> {
        let value = self.get(name);
        if !is_valid_email(value) {
            return Err(invalid(format!("{label}: enter a valid email address")));
        }
        Ok(value.to_string())
    }

    /// A slug, derived from `source` when left blank.
    fn slug(&self, name: &str, source: &str) -> AppResult<String> {
        let raw = self.get(name);
        let slug = if raw.is_empty() { slugify(source) } else { raw.to_string() };
        if slug.is_empty()
            || slug.chars().count() > SLUG_MAX
            || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(format!(
                "Url: use letters, numbers, hyphens or underscores (at most {SLUG_MAX})"
            )));
        }
        Ok(slug)
    }
}

const SLUG_MAX: usize = 160;

fn invalid(message: String) -> AppError {
    AppError::Validation(message)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SaveTarget {
    Create,
    Update(i32),
    /// "Save as new" from the change page of this row.
    CopyOf(i32),
}

impl SaveTarget {
    fn existing(self) -> Option<i32> {
        match self {
            SaveTarget::Update(id) => Some(id),
            SaveTarget::Create | SaveTarget::CopyOf(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Input {
    Text { max: usize },
    TextArea,
    Email,
    Number,
    Date,
    Checkbox,
    Select { choices: Vec<(i32, String)>, optional: bool },
    SelectMultiple { choices: Vec<(i32, String)> },
    /// Shown but not submitted.
    Readonly,
    Html(Markup),
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub input: Input,
    pub value: String,
    pub selected: Vec<i32>,
    pub help: Option<&'static str>,
}

impl Field {
    fn new(name: &'static str, label: &'static str, input: Input, value: impl ToString) -> Self {
        Self { name, label, input, value: value.to_string(), selected: Vec::new(), help: None }
    }

    fn text(name: &'static str, label: &'static str, max: usize, value: impl ToString) -> Self {
        Self::new(name, label, Input::Text { max }, value)
    }

    fn area(name: &'static str, label: &'static str, value: impl ToString) -> Self {
        Self::new(name, label, Input::TextArea, value)
    }

    fn number(name: &'static str, label: &'static str, value: impl ToString) -> Self {
        Self::new(name, label, Input::Number, value)
    }

    fn multi(name: &'static str, label: &'static str, choices: Vec<(i32, String)>) -> Self {
        Self::new(name, label, Input::SelectMultiple { choices }, "")
    }

    fn selected(mut self, ids: Vec<i32>) -> Self {
        self.selected = ids;
        self
    }

    fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

#[derive(Clone, Debug)]
pub struct Fieldset {
    pub title: Option<&'static str>,
    pub collapse: bool,
    pub fields: Vec<Field>,
}

impl Fieldset {
    fn plain(fields: Vec<Field>) -> Self {
        Self { title: None, collapse: false, fields }
    }
}

const DOLLARS: &str = "amount in dollars";

/// Form layout for `kind`, filled from row `id` when editing.
pub async fn fieldsets(
    db: &DatabaseConnection,
    cfg: &Config,
    kind: ModelKind,
    id: Option<i32>,
) -> AppResult<Vec<Fieldset>> {
    let sets = match kind {
        ModelKind::Category => {
            let c = load::<category::Entity>(db, id).await?;
            vec![Fieldset::plain(vec![
                Field::text("name", "Name", 150, opt(&c, |c| &c.name)),
                Field::area("description", "Description", opt(&c, |c| &c.description)),
                Field::text("url", "Url", SLUG_MAX, opt(&c, |c| &c.url)),
            ])]
        },

        ModelKind::Genre => {
            let g = load::<genre::Entity>(db, id).await?;
            vec![Fieldset::plain(vec![
                Field::text("name", "Name", 100, opt(&g, |g| &g.name)),
                Field::area("description", "Description", opt(&g, |g| &g.description)),
                Field::text("url", "Url", SLUG_MAX, opt(&g, |g| &g.url)),
            ])]
        },

        ModelKind::Actor => {
            let a = load::<actor::Entity>(db, id).await?;
            let mut fields = vec![
                Field::text("name", "Name", 100, opt(&a, |a| &a.name)),
                Field::number("age", "Age", a.as_ref().map_or(0, |a| a.age)),
                Field::area("description", "Description", opt(&a, |a| &a.description)),
                Field::text("image", "Image", 255, opt(&a, |a| &a.image))
                    .help("path under actors/"),
            ];
            if let Some(a) = &a {
                fields.push(Field::new("get_image", "Image", Input::Html(get_image(cfg, a)), ""));
            }
            vec![Fieldset::plain(fields)]
        },

        ModelKind::Movie => {
            let m = load::<movie::Entity>(db, id).await?;
            let (actor_ids, director_ids, genre_ids) = match &m {
                Some(m) => (
                    ids_of(m.find_related(actor::Entity).all(db).await?, |a| a.id),
                    ids_of(m.find_linked(movie::DirectorLink).all(db).await?, |a| a.id),
                    ids_of(m.find_related(genre::Entity).all(db).await?, |g| g.id),
                ),
                None => (Vec::new(), Vec::new(), Vec::new()),
            };
            let actors = choices(
                actor::Entity::find().order_by_asc(actor::Column::Name).all(db).await?,
                |a| (a.id, a.name.clone()),
            );
            let genres = choices(
                genre::Entity::find().order_by_asc(genre::Column::Name).all(db).await?,
                |g| (g.id, g.name.clone()),
            );
            let categories = choices(
                category::Entity::find().order_by_asc(category::Column::Name).all(db).await?,
                |c| (c.id, c.name.clone()),
            );
            let today = jiff::Zoned::now().date();

            vec![
                Fieldset::plain(vec![
                    Field::text("title", "Title", 100, opt(&m, |m| &m.title)),
                    Field::text("tagline", "Tagline", 100, opt(&m, |m| &m.tagline)),
                ]),
                Fieldset::plain(vec![
                    Field::area("description", "Description", opt(&m, |m| &m.description)),
                    Field::text("poster", "Poster", 255, opt(&m, |m| &m.poster))
                        .help("path under movies/"),
                ]),
                Fieldset::plain(vec![
                    Field::number(
                        "year",
                        "Year",
                        m.as_ref().map_or(i32::from(today.year()), |m| m.year),
                    ),
                    Field::new(
                        "world_premiere",
                        "World premiere",
                        Input::Date,
                        m.as_ref().map_or(today.to_string(), |m| m.world_premiere.clone()),
                    ),
                    Field::text("country", "Country", 30, opt(&m, |m| &m.country)),
                ]),
                Fieldset {
                    title: Some("Actors"),
                    collapse: true,
                    fields: vec![
                        Field::multi("actors", "Actors", actors.clone()).selected(actor_ids),
                        Field::multi("directors", "Directors", actors).selected(director_ids),
                        Field::multi("genres", "Genres", genres).selected(genre_ids),
                        Field::new(
                            "category",
                            "Category",
                            Input::Select { choices: categories, optional: true },
                            "",
                        )
                        .selected(m.as_ref().and_then(|m| m.category_id).into_iter().collect()),
                    ],
                },
                Fieldset::plain(vec![
                    Field::number("budget", "Budget", m.as_ref().map_or(0, |m| m.budget))
                        .help(DOLLARS),
                    Field::number(
                        "fees_in_usa",
                        "Fees in USA",
                        m.as_ref().map_or(0, |m| m.fees_in_usa),
                    )
                    .help(DOLLARS),
                    Field::number(
                        "fees_in_world",
                        "Fees in world",
                        m.as_ref().map_or(0, |m| m.fees_in_world),
                    )
                    .help(DOLLARS),
                ]),
                Fieldset {
                    title: Some("Options"),
                    collapse: true,
                    fields: vec![
                        Field::text("url", "Url", SLUG_MAX, opt(&m, |m| &m.url)),
                        Field::new(
                            "draft",
                            "Draft",
                            Input::Checkbox,
                            m.as_ref().is_none_or(|m| m.draft),
                        ),
                    ],
                },
            ]
        },

        ModelKind::MovieShots => {
            let s = load::<movie_shots::Entity>(db, id).await?;
            vec![Fieldset::plain(vec![
                Field::text("title", "Title", 100, opt(&s, |s| &s.title)),
                Field::area("description", "Description", opt(&s, |s| &s.description)),
                Field::text("image", "Image", 255, opt(&s, |s| &s.image))
                    .help("path under movie_shots/"),
                Field::new(
                    "movie",
                    "Movie",
                    Input::Select { choices: movie_choices(db).await?, optional: false },
                    "",
                )
                .selected(s.iter().map(|s| s.movie_id).collect()),
            ])]
        },

        ModelKind::RatingStar => {
            let s = load::<rating_star::Entity>(db, id).await?;
            vec![Fieldset::plain(vec![Field::new(
                "value",
                "Value",
                Input::Number,
                s.as_ref().map_or(0, |s| s.value),
            )])]
        },

        ModelKind::Rating => {
            let r = load::<rating::Entity>(db, id).await?;
            let stars = choices(
                rating_star::Entity::find()
                    .order_by_desc(rating_star::Column::Value)
                    .all(db)
                    .await?,
                |s| (s.id, s.to_string()),
            );
            vec![Fieldset::plain(vec![
                Field::text("ip", "IP address", 45, opt(&r, |r| &r.ip)),
                Field::new("star", "Star", Input::Select { choices: stars, optional: false }, "")
                    .selected(r.iter().map(|r| r.star_id).collect()),
                Field::new(
                    "movie",
                    "Movie",
                    Input::Select { choices: movie_choices(db).await?, optional: false },
                    "",
                )
                .selected(r.iter().map(|r| r.movie_id).collect()),
            ])]
        },

        ModelKind::Reviews => {
            let r = load::<reviews::Entity>(db, id).await?;
            let admin = kind.admin();
            let input = |name: &str, editable: Input| {
                if r.is_some() && admin.is_readonly(name) { Input::Readonly } else { editable }
            };
            let parents = reviews::Entity::find()
                .find_also_related(movie::Entity)
                .order_by_asc(reviews::Column::Id)
                .all(db)
                .await?
                .into_iter()
                .filter(|(p, _)| Some(p.id) != id)
                .map(|(p, m)| (p.id, review_label(&p, m.as_ref())))
                .collect();

            let mut fields = vec![
                Field::new("email", "Email", input("email", Input::Email), opt(&r, |r| &r.email)),
                Field::new(
                    "name",
                    "Name",
                    input("name", Input::Text { max: 100 }),
                    opt(&r, |r| &r.name),
                ),
                Field::area("text", "Message", opt(&r, |r| &r.text)),
                Field::new(
                    "parent",
                    "Parent",
                    Input::Select { choices: parents, optional: true },
                    "",
                )
                .selected(r.iter().filter_map(|r| r.parent_id).collect()),
                Field::new(
                    "movie",
                    "Movie",
                    Input::Select { choices: movie_choices(db).await?, optional: false },
                    "",
                )
                .selected(r.iter().map(|r| r.movie_id).collect()),
            ];
            if let Some(r) = &r {
                let replies = r.get_replies(db).await?;
                if !replies.is_empty() {
                    let links = Input::Html(reply_links(&replies));
                    fields.push(Field::new("replies", "Replies", links, ""));
                }
            }
            vec![Fieldset::plain(fields)]
        },

        ModelKind::Contact => {
            let c = load::<contact::Entity>(db, id).await?;
            vec![Fieldset::plain(vec![Field::new(
                "email",
                "Email",
                Input::Email,
                opt(&c, |c| &c.email),
            )])]
        },
    };

    Ok(sets)
}

/// Validates `data` and writes it; returns the id of the saved row.
pub async fn save(
    db: &DatabaseConnection,
    kind: ModelKind,
    target: SaveTarget,
    data: &FormData,
) -> AppResult<i32> {
    let existing = target.existing();
    if let Some(id) = existing {
        ensure_row(db, kind, id).await?;
    }

    let id = match kind {
        ModelKind::Category => {
            let name = data.text("name", "Name", 150)?;
            let mut row = category::ActiveModel {
                url: Set(data.slug("url", &name)?),
                name: Set(name),
                description: Set(data.text("description", "Description", usize::MAX)?),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::Genre => {
            let name = data.text("name", "Name", 100)?;
            let url = data.slug("url", &name)?;
            let mut clash = genre::Entity::find().filter(genre::Column::Url.eq(&url));
            if let Some(id) = existing {
                clash = clash.filter(genre::Column::Id.ne(id));
            }
            if clash.one(db).await?.is_some() {
                return Err(invalid(format!("Url: genre with url \"{url}\" already exists")));
            }

            let mut row = genre::ActiveModel {
                name: Set(name),
                description: Set(data.text("description", "Description", usize::MAX)?),
                url: Set(url),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::Actor => {
            let mut row = actor::ActiveModel {
                name: Set(data.text("name", "Name", 100)?),
                age: Set(data.non_negative("age", "Age")?),
                description: Set(data.text("description", "Description", usize::MAX)?),
                image: Set(media::upload_path(media::ACTORS_DIR, data.get("image"))?),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::Movie => save_movie(db, existing, data).await?,

        ModelKind::MovieShots => {
            let movie_id = data.id("movie", "Movie")?;
            ensure::<movie::Entity>(db, movie_id, "Movie").await?;
            let mut row = movie_shots::ActiveModel {
                title: Set(data.text("title", "Title", 100)?),
                description: Set(data.text("description", "Description", usize::MAX)?),
                image: Set(media::upload_path(media::MOVIE_SHOTS_DIR, data.get("image"))?),
                movie_id: Set(movie_id),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::RatingStar => {
            let mut row = rating_star::ActiveModel {
                value: Set(data.number("value", "Value")?),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::Rating => {
            let star_id = data.id("star", "Star")?;
            let movie_id = data.id("movie", "Movie")?;
            ensure::<rating_star::Entity>(db, star_id, "Star").await?;
            ensure::<movie::Entity>(db, movie_id, "Movie").await?;
            let mut row = rating::ActiveModel {
                ip: Set(data.text("ip", "IP address", 45)?),
                star_id: Set(star_id),
                movie_id: Set(movie_id),
                ..Default::default()
            };
            if let Some(id) = existing {
                row.id = Set(id);
            }
            persist(db, row, existing).await?.id
        },

        ModelKind::Reviews => save_review(db, target, data).await?,

        ModelKind::Contact => {
            let email = data.email("email", "Email")?;
            let row = match existing {
                Some(id) => {
                    contact::ActiveModel { id: Set(id), email: Set(email), ..Default::default() }
                },
                None => contact::ActiveModel {
                    email: Set(email),
                    date: Set(now_sec()),
                    ..Default::default()
                },
            };
            persist(db, row, existing).await?.id
        },
    };

    Ok(id)
}

pub async fn delete(db: &DatabaseConnection, kind: ModelKind, id: i32) -> AppResult<()> {
    let res = match kind {
        ModelKind::Category => category::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Movie => movie::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Reviews => reviews::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Actor => actor::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Genre => genre::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::MovieShots => movie_shots::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::RatingStar => rating_star::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Rating => rating::Entity::delete_by_id(id).exec(db).await?,
        ModelKind::Contact => contact::Entity::delete_by_id(id).exec(db).await?,
    };
    if res.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Movie row plus its actor, director and genre links, written in one transaction.
async fn save_movie(
    db: &DatabaseConnection,
    existing: Option<i32>,
    data: &FormData,
) -> AppResult<i32> {
    let title = data.text("title", "Title", 100)?;
    let url = data.slug("url", &title)?;

    let mut clash = movie::Entity::find().filter(movie::Column::Url.eq(&url));
    if let Some(id) = existing {
        clash = clash.filter(movie::Column::Id.ne(id));
    }
    if clash.one(db).await?.is_some() {
        return Err(invalid(format!("Url: movie with url \"{url}\" already exists")));
    }

    let category_id = data.optional_id("category", "Category")?;
    if let Some(category_id) = category_id {
        ensure::<category::Entity>(db, category_id, "Category").await?;
    }
    let actor_ids = data.ids("actors", "Actors")?;
    let director_ids = data.ids("directors", "Directors")?;
    let genre_ids = data.ids("genres", "Genres")?;
    for &id in actor_ids.iter().chain(&director_ids) {
        ensure::<actor::Entity>(db, id, "Actors").await?;
    }
    for &id in &genre_ids {
        ensure::<genre::Entity>(db, id, "Genres").await?;
    }

    let mut row = movie::ActiveModel {
        title: Set(title),
        tagline: Set(data.optional_text("tagline", "Tagline", 100)?),
        description: Set(data.text("description", "Description", usize::MAX)?),
        poster: Set(media::upload_path(media::MOVIES_DIR, data.get("poster"))?),
        year: Set(data.non_negative("year", "Year")?),
        country: Set(data.text("country", "Country", 30)?),
        world_premiere: Set(data.date("world_premiere", "World premiere")?),
        budget: Set(data.non_negative("budget", "Budget")?),
        fees_in_usa: Set(data.non_negative("fees_in_usa", "Fees in USA")?),
        fees_in_world: Set(data.non_negative("fees_in_world", "Fees in world")?),
        category_id: Set(category_id),
        url: Set(url),
        draft: Set(data.checkbox("draft")),
        ..Default::default()
    };
    if let Some(id) = existing {
        row.id = Set(id);
    }

    let txn = db.begin().await?;

    let movie = persist(&txn, row, existing).await?;

    movie_actor::Entity::delete_many()
        .filter(movie_actor::Column::MovieId.eq(movie.id))
        .exec(&txn)
        .await?;
    movie_director::Entity::delete_many()
        .filter(movie_director::Column::MovieId.eq(movie.id))
        .exec(&txn)
        .await?;
    movie_genre::Entity::delete_many()
        .filter(movie_genre::Column::MovieId.eq(movie.id))
        .exec(&txn)
        .await?;

    for actor_id in actor_ids {
        movie_actor::ActiveModel { movie_id: Set(movie.id), actor_id: Set(actor_id) }
            .insert(&txn)
            .await?;
    }
    for actor_id in director_ids {
        movie_director::ActiveModel { movie_id: Set(movie.id), actor_id: Set(actor_id) }
            .insert(&txn)
            .await?;
    }
    for genre_id in genre_ids {
        movie_genre::ActiveModel { movie_id: Set(movie.id), genre_id: Set(genre_id) }
            .insert(&txn)
            .await?;
    }

    txn.commit().await?;

    Ok(movie.id)
}

async fn save_review(
    db: &DatabaseConnection,
    target: SaveTarget,
    data: &FormData,
) -> AppResult<i32> {
    let admin = ModelKind::Reviews.admin();

    // Read-only fields keep the stored values of the row being edited or copied.
    let source = match target {
        SaveTarget::Update(id) | SaveTarget::CopyOf(id) => {
            reviews::Entity::find_by_id(id).one(db).await?
        },
        SaveTarget::Create => None,
    };
    let name = match &source {
        Some(r) if admin.is_readonly("name") => r.name.clone(),
        _ => data.text("name", "Name", reviews::NAME_MAX_CHARS)?,
    };
    let email = match &source {
        Some(r) if admin.is_readonly("email") => r.email.clone(),
        _ => data.email("email", "Email")?,
    };

    let movie_id = data.id("movie", "Movie")?;
    ensure::<movie::Entity>(db, movie_id, "Movie").await?;

    let parent_id = data.optional_id("parent", "Parent")?;
    if let Some(parent_id) = parent_id {
        let parent = reviews::Entity::find_by_id(parent_id).one(db).await?;
        let self_reference = target.existing() == Some(parent_id);
        if self_reference || parent.is_none_or(|p| p.movie_id != movie_id) {
            return Err(invalid("Parent: choose a review of the same movie".to_string()));
        }
    }

    let existing = target.existing();
    let mut row = reviews::ActiveModel {
        email: Set(email),
        name: Set(name),
        text: Set(data.text("text", "Message", reviews::TEXT_MAX_CHARS)?),
        parent_id: Set(parent_id),
        movie_id: Set(movie_id),
        ..Default::default()
    };
    if let Some(id) = existing {
        row.id = Set(id);
    }
    Ok(persist(db, row, existing).await?.id)
}

/// Inserts, or updates when editing an existing row.
async fn persist<A, C>(
    db: &C,
    row: A,
    existing: Option<i32>,
) -> AppResult<<A::Entity as EntityTrait>::Model>
where
    A: ActiveModelTrait + sea_orm::ActiveModelBehavior + Send,
    C: ConnectionTrait,
    <A::Entity as EntityTrait>::Model: sea_orm::IntoActiveModel<A>,
{
    let model = match existing {
        Some(_) => row.update(db).await?,
        None => row.insert(db).await?,
    };
    Ok(model)
}

async fn load<E>(db: &DatabaseConnection, id: Option<i32>) -> AppResult<Option<E::Model>>
where
    E: EntityTrait,
    i32: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    match id {
        Some(id) => Ok(Some(E::find_by_id(id).one(db).await?.ok_or(AppError::NotFound)?)),
        None => Ok(None),
    }
}

async fn ensure<E>(db: &DatabaseConnection, id: i32, label: &str) -> AppResult<()>
where
    E: EntityTrait,
    i32: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    if E::find_by_id(id).one(db).await?.is_none() {
        return Err(invalid(format!("{label}: select a valid choice")));
    }
    Ok(())
}

async fn ensure_row(db: &DatabaseConnection, kind: ModelKind, id: i32) -> AppResult<()> {
    match kind {
        ModelKind::Category => load::<category::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Movie => load::<movie::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Reviews => load::<reviews::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Actor => load::<actor::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Genre => load::<genre::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::MovieShots => load::<movie_shots::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::RatingStar => load::<rating_star::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Rating => load::<rating::Entity>(db, Some(id)).await.map(|_| ()),
        ModelKind::Contact => load::<contact::Entity>(db, Some(id)).await.map(|_| ()),
    }
}

async fn movie_choices(db: &DatabaseConnection) -> AppResult<Vec<(i32, String)>> {
    Ok(choices(
        movie::Entity::find().order_by_asc(movie::Column::Title).all(db).await?,
        |m| (m.id, m.title.clone()),
    ))
}

fn reply_links(replies: &[reviews::Model]) -> Markup {
    html! {
        ul class="space-y-1 text-sm" {
            @for reply in replies {
                li {
                    a class="text-blue-600" href=(ModelKind::Reviews.change_url(reply.id)) { (reply.name) }
                }
            }
        }
    }
}

fn choices<T>(rows: Vec<T>, f: impl Fn(&T) -> (i32, String)) -> Vec<(i32, String)> {
    rows.iter().map(f).collect()
}

fn ids_of<T>(rows: Vec<T>, f: impl Fn(&T) -> i32) -> Vec<i32> {
    rows.iter().map(f).collect()
}

fn opt<T>(row: &Option<T>, f: impl Fn(&T) -> &String) -> String {
    row.as_ref().map(f).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{db::test_db, testing};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn movie_form<'a>(title: &'a str, url: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("title", title),
            ("tagline", ""),
            ("description", "Heist drama"),
            ("poster", "heat.jpg"),
            ("year", "1995"),
            ("world_premiere", "1995-12-15"),
            ("country", "USA"),
            ("budget", "60000000"),
            ("fees_in_usa", "67436818"),
            ("fees_in_world", "187436818"),
            ("url", url),
        ]
    }

    #[tokio::test]
    async fn movie_save_writes_links_and_normalises_fields() {
        let db = test_db().await;
        let mann = testing::actor(&db, "Mann").await;
        let pacino = testing::actor(&db, "Pacino").await;
        let crime = testing::genre(&db, "Crime", "crime").await;
        let films = testing::category(&db, "Films", "films").await;

        let (m, p) = (mann.id.to_string(), pacino.id.to_string());
        let (g, c) = (crime.id.to_string(), films.id.to_string());
        let mut pairs = movie_form("Heat", "");
        pairs.extend([("directors", m.as_str()), ("actors", p.as_str()), ("genres", g.as_str())]);
        pairs.push(("category", c.as_str()));

        let id = save(&db, ModelKind::Movie, SaveTarget::Create, &form(&pairs)).await.unwrap();
        let movie = movie::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();

        assert_eq!(movie.url, "heat");
        assert_eq!(movie.poster, "movies/heat.jpg");
        assert_eq!(movie.category_id, Some(films.id));
        assert!(!movie.draft);
        assert_eq!(movie.find_linked(movie::DirectorLink).all(&db).await.unwrap(), [mann]);
        assert_eq!(movie.find_related(actor::Entity).all(&db).await.unwrap(), [pacino]);

        // Saving without links clears them.
        save(&db, ModelKind::Movie, SaveTarget::Update(id), &form(&movie_form("Heat", "heat")))
            .await
            .unwrap();
        assert_eq!(movie_actor::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(movie_director::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(movie_genre::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_slugs_are_rejected() {
        let db = test_db().await;
        save(&db, ModelKind::Movie, SaveTarget::Create, &form(&movie_form("Heat", "heat")))
            .await
            .unwrap();
        let clash =
            save(&db, ModelKind::Movie, SaveTarget::Create, &form(&movie_form("Heat 2", "heat")))
                .await;
        assert!(matches!(clash, Err(AppError::Validation(_))));

        let genre = [("name", "Crime"), ("description", "Crooks"), ("url", "")];
        save(&db, ModelKind::Genre, SaveTarget::Create, &form(&genre)).await.unwrap();
        let again = save(&db, ModelKind::Genre, SaveTarget::Create, &form(&genre)).await;
        assert!(matches!(again, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn categories_may_share_slugs_but_need_a_name() {
        let db = test_db().await;
        let category = [("name", "Films"), ("description", "Feature films"), ("url", "films")];
        save(&db, ModelKind::Category, SaveTarget::Create, &form(&category)).await.unwrap();
        save(&db, ModelKind::Category, SaveTarget::Create, &form(&category)).await.unwrap();
        assert_eq!(category::Entity::find().count(&db).await.unwrap(), 2);

        let nameless = [("name", "  "), ("description", "x"), ("url", "x")];
        let err = save(&db, ModelKind::Category, SaveTarget::Create, &form(&nameless)).await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn negative_numbers_are_rejected() {
        let db = test_db().await;
        let actor = [("name", "Pacino"), ("age", "-1"), ("description", "x"), ("image", "p.jpg")];
        let err = save(&db, ModelKind::Actor, SaveTarget::Create, &form(&actor)).await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn review_edit_keeps_readonly_fields() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let review = testing::review(&db, &movie, "Ann", None).await;
        let movie_id = movie.id.to_string();

        let edit = [
            ("name", "Mallory"),
            ("email", "mallory@example.com"),
            ("text", "Edited"),
            ("parent", ""),
            ("movie", movie_id.as_str()),
        ];
        save(&db, ModelKind::Reviews, SaveTarget::Update(review.id), &form(&edit)).await.unwrap();

        let saved = reviews::Entity::find_by_id(review.id).one(&db).await.unwrap().unwrap();
        assert_eq!(saved.name, "Ann");
        assert_eq!(saved.email, "ann@example.com");
        assert_eq!(saved.text, "Edited");

        let copy = save(&db, ModelKind::Reviews, SaveTarget::CopyOf(review.id), &form(&edit))
            .await
            .unwrap();
        let copy = reviews::Entity::find_by_id(copy).one(&db).await.unwrap().unwrap();
        assert_ne!(copy.id, review.id);
        assert_eq!(copy.name, "Ann");
    }

    #[tokio::test]
    async fn review_cannot_be_its_own_parent() {
        let db = test_db().await;
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let review = testing::review(&db, &movie, "Ann", None).await;
        let (movie_id, parent) = (movie.id.to_string(), review.id.to_string());

        let edit = [("text", "loop"), ("parent", parent.as_str()), ("movie", movie_id.as_str())];
        let err = save(&db, ModelKind::Reviews, SaveTarget::Update(review.id), &form(&edit)).await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_missing_row_is_not_found() {
        let db = test_db().await;
        assert!(matches!(delete(&db, ModelKind::Genre, 42).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn review_form_lists_replies() {
        let db = test_db().await;
        let cfg = Config::for_tests();
        let movie = testing::movie(&db, "Heat", "heat", None).await;
        let root = testing::review(&db, &movie, "Ann", None).await;
        let reply = testing::review(&db, &movie, "Bob", Some(&root)).await;

        let sets = fieldsets(&db, &cfg, ModelKind::Reviews, Some(root.id)).await.unwrap();
        let fields: Vec<_> = sets.iter().flat_map(|s| &s.fields).collect();
        assert!(matches!(fields[0].input, Input::Readonly));
        let replies = fields.iter().find(|f| f.name == "replies").unwrap();
        match &replies.input {
            Input::Html(markup) => {
                assert!(markup.0.contains(&format!("/admin/reviews/{}/change/", reply.id)))
            },
            other => panic!("unexpected input {other:?}"),
        }
    }

    #[tokio::test]
    async fn movie_form_defaults_to_draft() {
        let db = test_db().await;
        let cfg = Config::for_tests();
        let sets = fieldsets(&db, &cfg, ModelKind::Movie, None).await.unwrap();
        let draft = sets.iter().flat_map(|s| &s.fields).find(|f| f.name == "draft").unwrap();
        assert_eq!(draft.value, "true");
    }
}

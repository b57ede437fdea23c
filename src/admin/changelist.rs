use std::collections::HashMap;

use maud::{Markup, html};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Deserialize;

use super::{ModelAdmin, ModelKind, get_image};
use crate::{
    config::Config,
    entities::{
        actor, category, contact, genre, movie, movie_shots, rating, rating_star, reviews,
    },
    error::AppResult,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
    pub category: Option<i32>,
    pub year: Option<i32>,
}

impl ListQuery {
    fn search(&self) -> Option<&str> {
        let q = self.q.trim();
        (!q.is_empty()).then_some(q)
    }
}

#[derive(Clone, Debug)]
pub enum Cell {
    Text(String),
    Bool(bool),
    Html(Markup),
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Text(n.to_string())
    }
}

/// One change-list row; `cells` line up with `ModelAdmin::list_display`.
#[derive(Clone, Debug)]
pub struct Row {
    pub id: i32,
    pub cells: Vec<Cell>,
}

/// A `list_filter` group: the query parameter it sets and its choices.
#[derive(Clone, Debug)]
pub struct FilterGroup {
    pub title: &'static str,
    pub param: &'static str,
    pub choices: Vec<(String, String)>,
}

const EMPTY: &str = "-";

pub async fn rows(
    db: &DatabaseConnection,
    cfg: &Config,
    kind: ModelKind,
    query: &ListQuery,
) -> AppResult<Vec<Row>> {
    let rows = match kind {
        ModelKind::Category => category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(|c| Row { id: c.id, cells: vec![c.id.into(), c.name.into(), c.url.into()] })
            .collect(),

        ModelKind::Movie => {
            let mut select = movie::Entity::find().find_also_related(category::Entity);
            if let Some(q) = query.search() {
                select = select.filter(
                    Condition::any()
                        .add(movie::Column::Title.contains(q))
                        .add(category::Column::Name.contains(q)),
                );
            }
            if let Some(category_id) = query.category {
                select = select.filter(movie::Column::CategoryId.eq(category_id));
            }
            if let Some(year) = query.year {
                select = select.filter(movie::Column::Year.eq(year));
            }

            select
                .order_by_asc(movie::Column::Title)
                .all(db)
                .await?
                .into_iter()
                .map(|(m, c)| Row {
                    id: m.id,
                    cells: vec![
                        m.id.into(),
                        m.title.into(),
                        c.map(|c| c.name).unwrap_or_else(|| EMPTY.to_string()).into(),
                        m.url.into(),
                        Cell::Bool(m.draft),
                    ],
                })
                .collect()
        },

        ModelKind::Reviews => {
            let all = reviews::Entity::find()
                .find_also_related(movie::Entity)
                .order_by_desc(reviews::Column::Id)
                .all(db)
                .await?;
            let labels: HashMap<i32, String> =
                all.iter().map(|(r, m)| (r.id, review_label(r, m.as_ref()))).collect();

            all.into_iter()
                .map(|(r, m)| {
                    let parent = r
                        .parent_id
                        .and_then(|id| labels.get(&id).cloned())
                        .unwrap_or_else(|| EMPTY.to_string());
                    Row {
                        id: r.id,
                        cells: vec![
                            r.id.into(),
                            r.name.into(),
                            r.email.into(),
                            parent.into(),
                            m.map(|m| m.title).unwrap_or_default().into(),
                        ],
                    }
                })
                .collect()
        },

        ModelKind::Actor => actor::Entity::find()
            .order_by_asc(actor::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(|a| Row {
                id: a.id,
                cells: vec![a.name.clone().into(), a.age.into(), Cell::Html(get_image(cfg, &a))],
            })
            .collect(),

        ModelKind::Genre => genre::Entity::find()
            .order_by_asc(genre::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(|g| Row { id: g.id, cells: vec![g.to_string().into()] })
            .collect(),

        ModelKind::MovieShots => movie_shots::Entity::find()
            .order_by_asc(movie_shots::Column::MovieId)
            .order_by_asc(movie_shots::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|s| Row { id: s.id, cells: vec![s.to_string().into()] })
            .collect(),

        ModelKind::RatingStar => rating_star::Entity::find()
            .order_by_desc(rating_star::Column::Value)
            .all(db)
            .await?
            .into_iter()
            .map(|s| Row { id: s.id, cells: vec![s.to_string().into()] })
            .collect(),

        ModelKind::Rating => {
            let stars: HashMap<i32, i16> = rating_star::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|s| (s.id, s.value))
                .collect();

            rating::Entity::find()
                .find_also_related(movie::Entity)
                .order_by_desc(rating::Column::Id)
                .all(db)
                .await?
                .into_iter()
                .map(|(r, m)| Row {
                    id: r.id,
                    cells: vec![
                        r.id.into(),
                        m.map(|m| m.title).unwrap_or_default().into(),
                        r.ip.into(),
                        stars.get(&r.star_id).map(|v| v.to_string()).unwrap_or_default().into(),
                    ],
                })
                .collect()
        },

        ModelKind::Contact => contact::Entity::find()
            .order_by_desc(contact::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|c| Row { id: c.id, cells: vec![c.to_string().into()] })
            .collect(),
    };

    Ok(rows)
}

pub async fn filters(db: &DatabaseConnection, admin: &ModelAdmin) -> AppResult<Vec<FilterGroup>> {
    let mut groups = Vec::new();

    for name in admin.list_filter {
        match (admin.kind, *name) {
            (ModelKind::Movie, "category") => {
                let choices = category::Entity::find()
                    .order_by_asc(category::Column::Name)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|c| (c.id.to_string(), c.name))
                    .collect();
                groups.push(FilterGroup { title: "Category", param: "category", choices });
            },
            (ModelKind::Movie, "year") => {
                let years: Vec<i32> = movie::Entity::find()
                    .select_only()
                    .column(movie::Column::Year)
                    .distinct()
                    .order_by_desc(movie::Column::Year)
                    .into_tuple()
                    .all(db)
                    .await?;
                let choices = years.into_iter().map(|y| (y.to_string(), y.to_string())).collect();
                groups.push(FilterGroup { title: "Year", param: "year", choices });
            },
            _ => {},
        }
    }

    Ok(groups)
}

/// Every review of a movie, replies included, for the inline block.
pub async fn movie_reviews(
    db: &DatabaseConnection,
    movie: &movie::Model,
) -> AppResult<Vec<reviews::Model>> {
    Ok(movie.find_related(reviews::Entity).order_by_asc(reviews::Column::Id).all(db).await?)
}

/// The `"{name} - {movie}"` display string of a review.
pub fn review_label(review: &reviews::Model, movie: Option<&movie::Model>) -> String {
    match movie {
        Some(movie) => format!("{} - {}", review.name, movie),
        None => review.name.clone(),
    }
}

pub fn render_cell(cell: &Cell) -> Markup {
    match cell {
        Cell::Text(text) => html! { (text) },
        Cell::Bool(true) => html! { span class="text-green-600" { "yes" } },
        Cell::Bool(false) => html! { span class="text-red-600" { "no" } },
        Cell::Html(markup) => markup.clone(),
    }
}

use sea_orm::{QueryFilter, QueryOrder, entity::prelude::*};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub tagline: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub poster: String,
    pub year: i32,
    pub country: String,
    /// ISO date, `YYYY-MM-DD`.
    pub world_premiere: String,
    pub budget: i64,
    pub fees_in_usa: i64,
    pub fees_in_world: i64,
    pub category_id: Option<i32>,
    #[sea_orm(unique)]
    pub url: String,
    pub draft: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "super::movie_shots::Entity")]
    MovieShots,
    #[sea_orm(has_many = "super::rating::Entity")]
    Rating,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::movie_actor::Entity")]
    MovieActor,
    #[sea_orm(has_many = "super::movie_director::Entity")]
    MovieDirector,
    #[sea_orm(has_many = "super::movie_genre::Entity")]
    MovieGenre,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::movie_shots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieShots.def()
    }
}

impl Related<super::rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rating.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_actor::Relation::Actor.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_actor::Relation::Movie.def().rev())
    }
}

impl Related<super::genre::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_genre::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_genre::Relation::Movie.def().rev())
    }
}

/// The second actor role; `Related<actor::Entity>` already covers the cast.
#[derive(Debug)]
pub struct DirectorLink;

impl Linked for DirectorLink {
    type FromEntity = Entity;
    type ToEntity = super::actor::Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![
            super::movie_director::Relation::Movie.def().rev(),
            super::movie_director::Relation::Actor.def(),
        ]
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_absolute_url(&self) -> String {
        format!("/movie/{}/", self.url)
    }

    /// Top-level reviews, oldest first. Replies hang off these through `parent_id`.
    pub async fn get_review<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<Vec<super::reviews::Model>, DbErr> {
        self.find_related(super::reviews::Entity)
            .filter(super::reviews::Column::ParentId.is_null())
            .order_by_asc(super::reviews::Column::Id)
            .all(db)
            .await
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

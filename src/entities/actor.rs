use sea_orm::entity::prelude::*;

/// Actors and directors share one table; the role is the junction a row is linked through.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "actor")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub age: i32,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub image: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movie_actor::Entity")]
    MovieActor,
    #[sea_orm(has_many = "super::movie_director::Entity")]
    MovieDirector,
}

impl Related<super::movie::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_actor::Relation::Movie.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_actor::Relation::Actor.def().rev())
    }
}

/// Movies an actor directed.
#[derive(Debug)]
pub struct DirectedLink;

impl Linked for DirectedLink {
    type FromEntity = Entity;
    type ToEntity = super::movie::Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![
            super::movie_director::Relation::Actor.def().rev(),
            super::movie_director::Relation::Movie.def(),
        ]
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_absolute_url(&self) -> String {
        format!("/actor/{}/", urlencoding::encode(&self.name))
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

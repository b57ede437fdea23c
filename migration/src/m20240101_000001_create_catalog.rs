use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Category::Table)
                    .if_not_exists()
                    .col(pk_auto(Category::Id))
                    .col(string_len(Category::Name, 150))
                    .col(text(Category::Description))
                    .col(string_len(Category::Url, 160))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actor::Table)
                    .if_not_exists()
                    .col(pk_auto(Actor::Id))
                    .col(string_len(Actor::Name, 100))
                    .col(integer(Actor::Age).default(0))
                    .col(text(Actor::Description))
                    .col(string(Actor::Image))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genre::Table)
                    .if_not_exists()
                    .col(pk_auto(Genre::Id))
                    .col(string_len(Genre::Name, 100))
                    .col(text(Genre::Description))
                    .col(string_len_uniq(Genre::Url, 160))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(string_len(Movie::Title, 100))
                    .col(string_len(Movie::Tagline, 100).default(""))
                    .col(text(Movie::Description))
                    .col(string(Movie::Poster))
                    .col(integer(Movie::Year))
                    .col(string_len(Movie::Country, 30))
                    .col(string(Movie::WorldPremiere))
                    .col(big_integer(Movie::Budget).default(0))
                    .col(big_integer(Movie::FeesInUsa).default(0))
                    .col(big_integer(Movie::FeesInWorld).default(0))
                    .col(integer_null(Movie::CategoryId))
                    .col(string_len_uniq(Movie::Url, 160))
                    .col(boolean(Movie::Draft).default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_category")
                            .from(Movie::Table, Movie::CategoryId)
                            .to(Category::Table, Category::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_category_id")
                    .table(Movie::Table)
                    .col(Movie::CategoryId)
                    .to_owned(),
            )
            .await?;

        for (table, name) in [
            (MovieActor::Table, "movie_actor"),
            (MovieActor::DirectorTable, "movie_director"),
        ] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(integer(MovieActor::MovieId))
                        .col(integer(MovieActor::ActorId))
                        .primary_key(
                            Index::create().col(MovieActor::MovieId).col(MovieActor::ActorId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{name}_movie"))
                                .from(table, MovieActor::MovieId)
                                .to(Movie::Table, Movie::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{name}_actor"))
                                .from(table, MovieActor::ActorId)
                                .to(Actor::Table, Actor::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(MovieGenre::Table)
                    .if_not_exists()
                    .col(integer(MovieGenre::MovieId))
                    .col(integer(MovieGenre::GenreId))
                    .primary_key(Index::create().col(MovieGenre::MovieId).col(MovieGenre::GenreId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genre_movie")
                            .from(MovieGenre::Table, MovieGenre::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genre_genre")
                            .from(MovieGenre::Table, MovieGenre::GenreId)
                            .to(Genre::Table, Genre::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieShots::Table)
                    .if_not_exists()
                    .col(pk_auto(MovieShots::Id))
                    .col(string_len(MovieShots::Title, 100))
                    .col(text(MovieShots::Description))
                    .col(string(MovieShots::Image))
                    .col(integer(MovieShots::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_shots_movie")
                            .from(MovieShots::Table, MovieShots::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieShots::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieGenre::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieActor::DirectorTable).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieActor::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genre::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Actor::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Category::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Category {
    Table,
    Id,
    Name,
    Description,
    Url,
}

#[derive(DeriveIden)]
enum Actor {
    Table,
    Id,
    Name,
    Age,
    Description,
    Image,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    Id,
    Name,
    Description,
    Url,
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    Title,
    Tagline,
    Description,
    Poster,
    Year,
    Country,
    WorldPremiere,
    Budget,
    FeesInUsa,
    FeesInWorld,
    CategoryId,
    Url,
    Draft,
}

// Actors and directors share one junction layout.
#[derive(Clone, Copy, DeriveIden)]
enum MovieActor {
    Table,
    #[sea_orm(iden = "movie_director")]
    DirectorTable,
    MovieId,
    ActorId,
}

#[derive(DeriveIden)]
enum MovieGenre {
    Table,
    MovieId,
    GenreId,
}

#[derive(DeriveIden)]
enum MovieShots {
    Table,
    Id,
    Title,
    Description,
    Image,
    MovieId,
}

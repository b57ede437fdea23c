use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RatingStar::Table)
                    .if_not_exists()
                    .col(pk_auto(RatingStar::Id))
                    .col(small_integer(RatingStar::Value).default(0))
                    .to_owned(),
            )
            .await?;

        // Votes are not unique per (ip, movie); the vote endpoint updates in place instead.
        manager
            .create_table(
                Table::create()
                    .table(Rating::Table)
                    .if_not_exists()
                    .col(pk_auto(Rating::Id))
                    .col(string_len(Rating::Ip, 45))
                    .col(integer(Rating::StarId))
                    .col(integer(Rating::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_star")
                            .from(Rating::Table, Rating::StarId)
                            .to(RatingStar::Table, RatingStar::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_movie")
                            .from(Rating::Table, Rating::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rating_movie_ip")
                    .table(Rating::Table)
                    .col(Rating::MovieId)
                    .col(Rating::Ip)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(pk_auto(Reviews::Id))
                    .col(string(Reviews::Email))
                    .col(string_len(Reviews::Name, 100))
                    .col(text(Reviews::Text))
                    .col(integer_null(Reviews::ParentId))
                    .col(integer(Reviews::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_parent")
                            .from(Reviews::Table, Reviews::ParentId)
                            .to(Reviews::Table, Reviews::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_movie")
                            .from(Reviews::Table, Reviews::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_movie_parent")
                    .table(Reviews::Table)
                    .col(Reviews::MovieId)
                    .col(Reviews::ParentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Reviews::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Rating::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(RatingStar::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum RatingStar {
    Table,
    Id,
    Value,
}

#[derive(DeriveIden)]
enum Rating {
    Table,
    Id,
    Ip,
    StarId,
    MovieId,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    Email,
    Name,
    Text,
    ParentId,
    MovieId,
}

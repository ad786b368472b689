use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VideoFavorites::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VideoFavorites::UserId).integer().not_null())
                    .col(ColumnDef::new(VideoFavorites::VideoId).uuid().not_null())
                    .col(
                        ColumnDef::new(VideoFavorites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // The composite key doubles as the at-most-one-row-per-pair
                    // constraint the toggle endpoint leans on.
                    .primary_key(
                        Index::create()
                            .name("pk_video_favorites")
                            .col(VideoFavorites::UserId)
                            .col(VideoFavorites::VideoId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_video_favorites_user_id")
                            .from(VideoFavorites::Table, VideoFavorites::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_video_favorites_video_id")
                            .from(VideoFavorites::Table, VideoFavorites::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VideoFavorites::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VideoFavorites {
    Table,
    UserId,
    VideoId,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Videos {
    Table,
    Id,
}

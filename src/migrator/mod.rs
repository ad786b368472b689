use sea_orm_migration::prelude::*;

mod m20260605_000001_create_users;
mod m20260605_000002_create_videos;
mod m20260605_000003_create_favorites;
mod m20260619_000001_add_session_token;
mod m20260626_000001_add_password_reset;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260605_000001_create_users::Migration),
            Box::new(m20260605_000002_create_videos::Migration),
            Box::new(m20260605_000003_create_favorites::Migration),
            Box::new(m20260619_000001_add_session_token::Migration),
            Box::new(m20260626_000001_add_password_reset::Migration),
        ]
    }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_UPLOADED: &str = "uploaded";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_ANALYZED: &str = "analyzed";
pub const STATUS_FAILED: &str = "failed";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_deserializing)]
    pub id: Uuid,
    pub user_id: i32,
    #[sea_orm(unique)]
    pub storage_key: String,
    pub public_url: String,
    pub title: String,
    pub exercise_type: String,
    pub status: String,
    // JsonBinary for flexible storage of whatever the analysis service returns.
    // Non-null only when status is "analyzed".
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub analysis_result: Option<serde_json::Value>,
    // Populated on every "failed" transition so failures stay diagnosable.
    pub failure_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorite,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use crate::entities::{favorite, user, video};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Seed the gauges from table counts so dashboards are right from boot
/// rather than from the first event.
pub async fn init_metrics(db: &DatabaseConnection) {
    let user_count = user::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("formcheck_users_total").set(user_count as f64);

    let video_count = video::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("formcheck_videos_total").set(video_count as f64);

    let favorite_count = favorite::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("formcheck_favorites_total").set(favorite_count as f64);

    for status in [
        video::STATUS_UPLOADED,
        video::STATUS_PROCESSING,
        video::STATUS_ANALYZED,
        video::STATUS_FAILED,
    ] {
        let count = video::Entity::find()
            .filter(video::Column::Status.eq(status))
            .count(db)
            .await
            .unwrap_or(0);
        metrics::gauge!("formcheck_videos_by_status", "status" => status).set(count as f64);
    }

    tracing::info!(
        "Initialized metrics: Users={}, Videos={}, Favorites={}",
        user_count,
        video_count,
        favorite_count
    );
}

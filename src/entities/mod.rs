pub mod favorite;
pub mod user;
pub mod video;

pub use favorite::Entity as Favorite;
pub use user::Entity as User;
pub use video::Entity as Video;

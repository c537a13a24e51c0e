//! Per-entity table mappings and the repositories built on the generic
//! engine.

pub mod post_likes;
pub mod post_media;
pub mod post_views;
pub mod posts;
pub mod tags;
pub mod users;

pub use post_likes::PostLikesRepository;
pub use post_media::PostMediaRepository;
pub use post_views::PostViewsRepository;
pub use posts::{PostCounter, PostsRepository};
pub use tags::TagsRepository;
pub use users::UsersRepository;

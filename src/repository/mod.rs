// Repositories - the surface callers hold instead of DAOs
pub mod items;
pub mod users;

pub use items::{ItemsRepository, StoreItemsRepository};
pub use users::UserRepository;

pub mod admin;
pub mod auth;
pub mod engagement;
pub mod error;
pub mod posts;
pub mod users;

pub use error::ServiceError;

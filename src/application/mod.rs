//! Application services and the repository ports they depend on.

pub mod catalog;
pub mod error;
pub mod ordering;
pub mod pagination;
pub mod populate;
pub mod repos;
pub mod users;

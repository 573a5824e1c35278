//! Application services: cached catalog reads and the cart view.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod repos;

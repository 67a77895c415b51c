// routes/mod.rs
// Public re-exports of all route handlers.

pub mod api;

pub use api::*;

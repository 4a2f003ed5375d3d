//! Personal task board: tasks with priority, category and due date, grouped
//! into today / tomorrow / this week / completed, with live search.

pub mod app;
pub mod auth;
pub mod board;
pub mod config;
pub mod error;
pub mod organizer;
pub mod store;
pub mod task;
pub mod ui;

pub use error::{Error, Result};

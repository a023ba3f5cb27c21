mod error;
pub use error::*;

pub mod api;
pub mod cloud;
pub mod config;
pub mod crypto;
pub mod database;
pub mod forms;
pub mod logger;
pub mod mail;
pub mod models;
pub mod paginate;
pub(crate) mod time_utils;
pub mod ui;

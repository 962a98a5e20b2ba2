pub mod app;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod logging;
pub mod rank;
pub mod saavn;
pub mod state;
pub mod utils;
pub mod web;

pub mod app;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod form;
pub mod model;
pub mod output;
pub mod pagination;
pub mod render;
pub mod schema;
pub mod utils;
pub mod view;

#[cfg(test)]
mod tests;

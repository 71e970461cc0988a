pub mod app;
pub mod catalog;
pub mod config;
pub mod das;
pub mod domain;
pub mod error;
pub mod output;
pub mod resolver;
pub mod staging;
pub mod store;
pub mod tools;

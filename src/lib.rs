pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod scope;
pub mod seed;
pub mod state;
pub mod ui;
pub mod viewmodel;

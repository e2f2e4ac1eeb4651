// Library exports for postboard
// The binary and the integration tests both build on these modules

pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod repository;
pub mod state;

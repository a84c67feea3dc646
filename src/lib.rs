//! Backend for the pole survey app: geotagged submissions with photos,
//! account and Google sessions, per-user trip timing and weekly distances.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jwt;
pub mod models;
pub mod repo;
pub mod routes;
pub mod services;
pub mod state;

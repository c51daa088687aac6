pub mod client;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod normalization;
pub mod record;
pub mod routes;
pub mod validation;

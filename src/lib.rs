pub mod app_state;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod infra;
pub mod notify;
pub mod paymongo;
pub mod repository;
pub mod security;
pub mod telemetry;

//! documents-service: storage and retrieval of clinical documents.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

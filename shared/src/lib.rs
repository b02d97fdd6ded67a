//! Shared types for Downloader NinjaX: wire models, the error taxonomy,
//! URL validation, cookie export files and the download slot pool.
pub mod cookies;
pub mod errors;
pub mod job_slots;
pub mod models;
pub mod validation;

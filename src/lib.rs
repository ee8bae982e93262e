pub mod api;
pub mod config;
pub mod enrichment;
pub mod models;
pub mod redirect;
pub mod routing;
pub mod storage;

// Library for tests to access modules

pub mod config;
pub mod docker_repo;
pub mod error;
pub mod labels;
pub mod models;
pub mod reconciler;
pub mod routes;

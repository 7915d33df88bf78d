// Library exports for integration tests and external use

pub mod ability;
pub mod app_data;
pub mod audit;
pub mod cli;
pub mod config;
pub mod errors;
pub mod integrity;
pub mod stores;
pub mod types;

#[cfg(test)]
pub mod test;

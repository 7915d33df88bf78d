// Errors layer - Error type definitions

pub mod domain;

// Re-exports for convenience
pub use domain::{DomainError, IntegrityRule};

#[cfg(test)]
mod domain_test;

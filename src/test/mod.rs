// Test-only helpers, compiled only for the test profile

pub mod utils;

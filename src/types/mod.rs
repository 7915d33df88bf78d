pub mod entities;
pub mod internal;

pub mod file;
pub mod render;
pub mod suite;
pub mod synthesize;

pub mod ast;
pub mod framework;
pub mod infer;
pub mod language;

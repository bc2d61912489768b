pub mod archive;
pub mod assembler;
pub mod config;
pub mod grading;
pub mod template;
pub mod types;

pub mod clone;
pub mod env;
pub mod taskfile;
pub mod template;

pub mod completions;
pub mod config;
pub mod cycle;
pub mod history;
pub mod project;
pub mod select;
pub mod timer;

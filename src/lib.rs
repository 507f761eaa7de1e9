pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod files;
pub mod format;
pub mod github;
pub mod model;
pub mod paths;
pub mod report;
pub mod summary;

pub mod backend;
pub mod build;
pub mod config;
pub mod export;
pub mod logs;
pub mod sandbox;

pub mod cli;
pub mod config;
pub mod generator;
pub mod script;

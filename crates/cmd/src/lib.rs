pub mod commands;
pub mod common;
pub mod output;

//! shellview command line: terminal and panel surfaces over the session runtime.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod panel;

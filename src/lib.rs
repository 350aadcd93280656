#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod git;
pub mod index;
pub mod remote;
pub mod resolve;
pub mod util;

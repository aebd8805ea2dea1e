#![forbid(unsafe_code)]

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod content;
pub mod formats;
pub mod logging;
pub mod markdown;
pub mod navigation;
pub mod page;
pub mod prerender;
pub mod progress;
pub mod text;
pub mod widgets;

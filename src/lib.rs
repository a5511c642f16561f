#![forbid(unsafe_code)]

pub mod cli;
pub mod controller;
pub mod error;
pub mod extract;
pub mod extractor;
pub mod fetch;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod progress;
pub mod read;
pub mod resolver;
pub mod sanitize;
pub mod scroll;
pub mod session;
pub mod settings;
pub mod surface;
pub mod toc;
pub mod view;

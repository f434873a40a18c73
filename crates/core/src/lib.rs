#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod corpus;
pub mod frontmatter;
pub mod index;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Tool and resource registries exposed over MCP

pub mod callback;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod tools;
pub mod utils;

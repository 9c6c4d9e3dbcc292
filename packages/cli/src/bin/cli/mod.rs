pub mod connections;
pub mod profile;
pub mod utils;

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod observability;

#[cfg(test)]
mod test_utils;

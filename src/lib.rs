pub mod api;
pub mod config;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

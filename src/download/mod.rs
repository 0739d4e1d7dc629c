pub mod engine;
pub mod error;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

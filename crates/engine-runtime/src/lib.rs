pub mod error;
pub mod execution;
pub mod source;

#[cfg(test)]
mod tests;

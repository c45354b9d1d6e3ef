pub mod clock;
pub mod mysql;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub mod memory;

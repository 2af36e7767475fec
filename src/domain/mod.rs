pub mod aggregate;
pub mod allocation;
pub mod comparison;
pub mod derived;
pub mod grid;
pub mod meter;
pub mod series;
pub mod session;

pub mod health;
pub mod start;

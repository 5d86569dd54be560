pub mod assistant;
pub mod repair;
pub mod session;

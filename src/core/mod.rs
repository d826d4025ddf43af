pub mod clock;
pub mod config;
pub mod control_room;
pub mod dispatcher;
pub mod employees;
pub mod error;
pub mod history;
pub mod model;
pub mod palette;
pub mod random;
pub mod registry;
pub mod scheduler;
pub mod seed;

#[cfg(test)]
mod sim_test;

pub mod command;
pub mod controller;
pub mod dispatcher;
pub mod display;
pub mod pending_pool;
pub mod strategy;

pub use command::{Command, ParseCommandError};
pub use controller::FleetController;
pub use dispatcher::Dispatcher;
pub use pending_pool::PendingPool;
pub use strategy::AssignmentStrategy;

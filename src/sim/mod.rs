pub mod event;
pub mod flow;
pub mod scheduler;
pub mod state;

pub mod executor;
pub mod health;
pub mod queue;
pub mod sink;
pub mod tracker;
pub mod webhook;

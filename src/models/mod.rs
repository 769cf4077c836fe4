pub mod delivery;
pub mod embed;
pub mod health;
pub mod retry;
pub mod status;
pub mod task;

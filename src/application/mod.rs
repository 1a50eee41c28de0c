pub mod auth;
pub mod bootstrap;
pub mod commands;
pub mod display;
pub mod inventory;
pub mod phrases;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod timer;

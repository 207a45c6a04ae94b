pub mod auction;
pub mod bidding;
pub mod broadcast;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod roster;
pub mod round;
pub mod timer;

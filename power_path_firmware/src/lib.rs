#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod charger;
pub mod config;
pub mod shared_state;

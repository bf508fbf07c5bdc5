#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod events;
pub mod gesture;
pub mod health;
pub mod platform;
pub mod power;
pub mod protocol;
pub mod runtime;
pub mod slots;
pub mod work;

#[cfg(test)]
mod testing;

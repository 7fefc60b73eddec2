#![cfg_attr(not(feature = "std"), no_std)]

//! Discrete-time PID regulator core for periodic invocation from a
//! real-time control loop.

pub mod controller;

pub use controller::pid::{Direction, Mode, PidController, ProportionalOn};

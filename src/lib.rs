//! # Avionics Bench Library
//!
//! Ground-support serial test harness for rocket avionics boards.
//!
//! This library drives avionics boards through their operating modes
//! over a serial link, requests sensor and telemetry readings, clears
//! onboard storage, and verifies storage growth over time.

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod session;
pub mod runner;

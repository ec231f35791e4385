//! # Wire Protocol Module
//!
//! Command/response protocol spoken with the avionics boards.
//!
//! This module handles:
//! - Opcode catalog and operating modes
//! - Command frame encoding (opcode + terminator)
//! - Fixed-layout little-endian telemetry record decoding
//! - Acknowledgment byte extraction

pub mod wire;
pub mod encoder;
pub mod decoder;

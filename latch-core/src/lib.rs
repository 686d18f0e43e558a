#![no_std]

// Shared control logic for the latch actuation controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and consuming the platform capabilities it needs (pin
// access, a monotonic clock) as traits the other crates implement.
pub mod cli;
pub mod controller;
pub mod io;
pub mod params;
pub mod telemetry;

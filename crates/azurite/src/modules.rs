//! Interfaces of the pluggable emulator modules.

pub mod debug;

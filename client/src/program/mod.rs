//! Instruction encoders and account layouts for the native programs the
//! client talks to directly. The vault program is described by its
//! interface file instead; see [`crate::idl`].

pub mod system;
pub mod token;

//! Domain layer
//!
//! Contains the key handling, cipher, vault and guard logic.

pub mod security;

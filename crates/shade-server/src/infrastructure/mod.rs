//! Infrastructure layer for the shade server.
//!
//! Contains OS-facing adapters: the serial motor driver, the in-memory
//! development backend, the HTTP request transport, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `shade_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod http;
pub mod memory;
pub mod motor;
pub mod storage;

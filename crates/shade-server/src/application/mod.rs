//! Application layer use cases for the shade server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules) and the infrastructure (serial ports, HTTP, files).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "move the
//!   shade to 40% open").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the motor driver can be swapped for an in-memory one without changing
//!   this code.
//! - **Contain no OS calls, no network I/O, no file system access**.
//!
//! # Sub-modules
//!
//! - **`control_shade`** – The [`control_shade::ShadeAdapter`] port and the
//!   [`control_shade::ShadeService`] that serializes every request onto it.

pub mod control_shade;

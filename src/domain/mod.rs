//! Domain Layer
//!
//! Entities, value objects, the backend wire protocol and the outbound ports.
//! Nothing here performs I/O.

pub mod entities;
pub mod ports;
pub mod protocol;
pub mod value_objects;

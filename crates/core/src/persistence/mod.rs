//! Seams to the external persistence layer: persisted row shapes and the
//! async traits the reactive core reads them through.

pub mod rows;
pub mod traits;

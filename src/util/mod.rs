//! Small, shared utility helpers.

pub mod alignment;

//! `access`: authenticates every request under a router.
//! `protect`: per-route DPoP / scope requirements on top of it.
pub mod access;
pub mod protect;

pub use protect::protected;

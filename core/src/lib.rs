//! Shared domain records for the PixelPeak BCI services.
//!
//! Everything here is plain data plus the static emotion profile table; no
//! network or filesystem access happens in this crate.

pub mod avatar;
pub mod emotion;
pub mod error;
pub mod patterns;
pub mod provenance;
pub mod scenario;
pub mod speech;

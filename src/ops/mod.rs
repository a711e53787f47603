//! Numeric kernels: the "hard part" of the crate (spec §2).

pub mod exp;
pub mod fused;
pub mod mult;
pub mod outer;

//! Provider traits implemented by reasoning-engine adapters.

pub mod analysis;
pub mod classification;

//! Request and response types shared by providers and the domain layer.

pub mod analysis;
pub mod classification;

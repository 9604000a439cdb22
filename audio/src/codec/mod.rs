//! Audio container implementations.
//!
//! - `ogg`: Ogg container format (RFC 3533) with the Opus mapping (RFC 7845)

pub mod ogg;

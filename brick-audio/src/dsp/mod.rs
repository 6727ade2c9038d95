//! Block processors and the sample math they share.

pub mod helpers;
pub mod intrinsics;
mod mix;
mod tone;

pub use mix::MixRouter;
pub use tone::TestTone;

// quire-common: pure path and link primitives shared by the Quire crates.

pub mod links;
pub mod path;
pub mod sync;

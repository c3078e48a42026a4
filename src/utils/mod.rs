pub mod interner;

pub use interner::{Symbol, intern, resolve};

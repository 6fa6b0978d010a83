pub mod preprocessing;
pub mod skeleton;

pub use preprocessing::*;
pub use skeleton::*;

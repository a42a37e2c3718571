//! REST API handlers

pub mod callback;
pub mod health;
pub mod simulate;
pub mod subscription;

pub use callback::*;
pub use health::*;
pub use simulate::*;
pub use subscription::*;

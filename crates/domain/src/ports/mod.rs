pub mod clock;
pub mod notification;

pub use clock::*;
pub use notification::*;

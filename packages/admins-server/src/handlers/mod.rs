mod admins;
mod health;
mod sessions;

pub use admins::*;
pub use health::*;
pub use sessions::*;

pub mod envelope;
pub mod health;
pub mod request;

pub use envelope::*;
pub use health::*;
pub use request::*;

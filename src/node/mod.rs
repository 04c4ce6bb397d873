pub mod form;
pub mod kind;
pub mod registry;

pub use form::*;
pub use kind::*;
pub use registry::*;

pub mod endpoints;
pub mod manager;
pub mod select;
pub use endpoints::*;

pub mod checker;
pub mod compare;
pub mod config;
pub mod error;
pub mod fixture;
pub mod http;
pub mod loader;
pub mod suite;

pub use checker::*;
pub use compare::*;
pub use config::*;
pub use error::*;
pub use fixture::*;
pub use http::*;
pub use loader::*;
pub use suite::*;

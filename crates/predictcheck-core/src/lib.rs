pub mod artifact;
pub mod backend;
pub mod engine;
pub mod memory;
pub mod model;
pub mod spec;
pub mod tensor;

pub use artifact::*;
pub use backend::*;
pub use engine::*;
pub use memory::*;
pub use model::*;
pub use spec::*;
pub use tensor::*;

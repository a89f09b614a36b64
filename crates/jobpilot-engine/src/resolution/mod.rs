pub mod engine;
pub mod result;

pub use engine::ElementResolver;
pub use result::Resolution;

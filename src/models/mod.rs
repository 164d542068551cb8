pub mod project;
pub mod specification;
pub mod user;

pub use project::*;
pub use specification::*;
pub use user::*;

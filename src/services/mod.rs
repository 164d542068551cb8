pub mod archiver;
pub mod materializer;
pub mod metrics;
pub mod model_client;
pub mod orchestrator;
pub mod quota_manager;
pub mod spec_generator;

pub use archiver::*;
pub use materializer::*;
pub use self::metrics::*;
pub use model_client::*;
pub use orchestrator::*;
pub use quota_manager::*;
pub use spec_generator::*;

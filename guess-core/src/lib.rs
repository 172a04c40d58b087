pub mod cleanup;
pub mod clock;
pub mod config;
pub mod events;
pub mod guess_validation;
pub mod question_pool;
pub mod registry;
pub mod scheduler;
pub mod scoring;
pub mod session;

// Re-export main components
pub use cleanup::*;
pub use clock::*;
pub use config::*;
pub use events::*;
pub use guess_validation::*;
pub use question_pool::*;
pub use registry::*;
pub use scheduler::*;
pub use scoring::*;
pub use session::*;

//! Text generation: backends, prompt construction, cleaning and the retrying adapter.

pub mod adapter;
pub mod backend;
pub mod clean;
pub mod prompt;

pub use adapter::{AdapterSettings, GeneratorAdapter};
pub use backend::{DynBackend, GenerativeBackend};
pub use prompt::PromptBuilder;

pub mod apply;
pub mod backup;
pub mod config;
pub mod create;
pub mod decisions;
pub mod logging;
pub mod patcher;
pub mod scan;
pub mod store;

pub use apply::ApplyOutcome;
pub use config::Settings;
pub use create::CreateOutcome;
pub use decisions::DecisionMemory;
pub use patcher::{FolderPicker, Patcher};
pub use store::PatchStore;

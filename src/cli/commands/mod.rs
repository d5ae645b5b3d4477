//! CLI command implementations

pub mod clear;
pub mod config;
pub mod locate;
pub mod refresh;
pub mod status;
pub mod sync;

pub use clear::execute as clear;
pub use config::execute as config;
pub use locate::execute as locate;
pub use refresh::execute as refresh;
pub use status::execute as status;
pub use sync::execute as sync;

//! Terminal output for the CLI
//!
//! Uses `cliclack` for framed output and prompts, `indicatif` for sync
//! progress, and falls back to plain lines in CI or when output is piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use artcache::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! if ui::confirm(&ctx, "Delete every cached entry?", false).await? {
//!     let mut spinner = TaskSpinner::new(&ctx);
//!     spinner.start("Clearing caches...");
//!     // ... do work ...
//!     spinner.stop("Caches cleared");
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, remark, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{SyncProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, ArtcacheTheme};

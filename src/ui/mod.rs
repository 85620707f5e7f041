//! Terminal output for the stepcache CLI
//!
//! Uses `cliclack` for interactive prompts and spinners, falling back to
//! plain bracketed output when stdout is not a terminal or CI is detected.
//!
//! ```rust,ignore
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! if !ui::confirm_destructive(&ctx, "Remove 3 checkpoint(s)?").await? {
//!     return Ok(());
//! }
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Truncating...");
//! spinner.stop("Removed 3 checkpoint(s)");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    format_bytes, intro, key_value, key_value_status, outro_success, outro_warn, remark, step_info,
    step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::{confirm, confirm_destructive};
pub use theme::{init_theme, StepcacheTheme};

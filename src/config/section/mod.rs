//! Configuration section definitions.

pub mod hooks;
pub mod serve;
pub mod theme;

pub use hooks::{HookConfig, HooksConfig};
pub use serve::DevAddr;
pub use theme::ThemeConfig;

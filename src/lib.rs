pub mod effects;
pub mod error;
pub mod hotkey;
pub mod ip_lookup;
pub mod logging;
pub mod overlay;
pub mod settings;

//! # beam-settings
//!
//! Configuration with layered sources for the beam relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BeamSettings::default()`]
//! 2. **Settings file**: `~/.beam/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `BEAM_*` overrides (highest priority)
//!
//! The loaded value is passed explicitly to the server; there is no global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    IgnoredOverride, LoadedSettings, deep_merge, load_settings_from_path, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = BeamSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = BeamSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.relay.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(settings.logging.level, "info");
    }
}

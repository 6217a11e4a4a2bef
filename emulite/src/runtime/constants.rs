//! Constants for the emulite runtime
//!
//! Environment variable names and file names that are not specific to one
//! component.

pub mod envs {
    /// Overrides the config file location
    pub const EMULITE_CONFIG: &str = "EMULITE_CONFIG";

    /// SDK root directory
    pub const EMULITE_SDK_ROOT: &str = "EMULITE_SDK_ROOT";

    /// Build output directory
    pub const EMULITE_OUTPUT_DIR: &str = "EMULITE_OUTPUT_DIR";

    /// Emulator install directory
    pub const EMULITE_EMU_ROOT: &str = "EMULITE_EMU_ROOT";
}

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

#![allow(dead_code)]

use assert_cmd::Command;
use emulite_test_utils::SdkFixture;
use std::time::Duration;

const EMULITE_ENVS: &[&str] = &[
    "EMULITE_CONFIG",
    "EMULITE_SDK_ROOT",
    "EMULITE_OUTPUT_DIR",
    "EMULITE_EMU_ROOT",
];

pub struct TestContext {
    pub fixture: SdkFixture,
}

impl TestContext {
    /// `emulite` pointed at this context's fixture through its config file.
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_emulite");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        for name in EMULITE_ENVS {
            cmd.env_remove(name);
        }
        cmd.arg("--config").arg(self.fixture.write_config());
        cmd
    }

    /// `emulite` with no configuration at all.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_emulite"));
        for name in EMULITE_ENVS {
            cmd.env_remove(name);
        }
        // Keep a config under the real home directory out of the picture.
        cmd.env("HOME", self.fixture.root());
        cmd.env("XDG_CONFIG_HOME", self.fixture.root().join("xdg"));
        cmd
    }
}

pub fn emulite() -> TestContext {
    TestContext {
        fixture: SdkFixture::new(),
    }
}

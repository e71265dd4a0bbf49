//! Shared test utilities for grk-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub const LOGIN_CONTROLLER: &str = r#"<?php

namespace App\Auth;

class LoginController
{
    public function login($request)
    {
        $credentials = $request->only('email', 'password');
        return Auth::attempt($credentials);
    }
}
"#;

pub const CART_CONTROLLER: &str = r#"<?php

namespace App\Shop;

class CartController
{
    public function add($request)
    {
        return view('cart');
    }
}
"#;

pub const SCRIPTED_REPLY: &str = "`LoginController::login` passes the credentials to `Auth::attempt` (app/Auth/LoginController.php:L10).\nConfidence: high";

/// Get a Command for the grk binary.
///
/// # Panics
///
/// Panics if the grk binary cannot be found.
#[allow(deprecated)]
pub fn grk_cmd() -> Command {
    Command::cargo_bin("grk").expect("grk binary should exist")
}

/// A throwaway project plus a global config kept outside of it.
pub struct TestProject {
    pub dir: TempDir,
    config_dir: TempDir,
}

impl TestProject {
    /// Two PHP controllers and a scripted completion model.
    pub fn new() -> Self {
        let project = Self::empty();
        project.write("app/Auth/LoginController.php", LOGIN_CONTROLLER);
        project.write("app/Shop/CartController.php", CART_CONTROLLER);
        project
    }

    pub fn empty() -> Self {
        let project = Self {
            dir: TempDir::new().expect("create project dir"),
            config_dir: TempDir::new().expect("create config dir"),
        };
        project.write_config(&format!(
            "store:\n  retainScans: 3\nmodel:\n  provider: scripted\n  scriptedReply: {}\n",
            serde_json::to_string(SCRIPTED_REPLY).expect("quote reply")
        ));
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.yaml")
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create parent dir");
        fs::write(path, content).expect("write project file");
    }

    pub fn write_config(&self, yaml: &str) {
        fs::write(self.config_path(), yaml).expect("write config");
    }

    /// `grk` running inside the project with this project's config.
    pub fn cmd(&self) -> Command {
        let mut cmd = grk_cmd();
        cmd.current_dir(self.root())
            .env("GRK_CONFIG", self.config_path())
            .env("NO_COLOR", "1")
            .env_remove("GRK_VERBOSE")
            .env_remove("GRK_QUIET")
            .env_remove("GRK_COLOR");
        cmd
    }

    /// Run `grk init` and `grk build`.
    pub fn init_and_build(&self) {
        self.cmd().arg("init").assert().success();
        self.cmd().arg("build").assert().success();
    }

    /// Parse a command's stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.cmd().args(args).arg("--json").output().expect("run grk");
        assert!(
            output.status.success(),
            "grk {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid JSON output")
    }
}

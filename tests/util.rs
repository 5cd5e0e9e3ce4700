//! Shared test utilities for integration tests
//!
//! Provides fixture trees and config helpers used across
//! multiple test files.

#![allow(dead_code)]

use assert_fs::prelude::*;
use ctxpack::infra::Settings;
use ctxpack::PipelineConfig;

/// Python project with one module, one test suite and a README
pub fn make_python_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/app.py")
        .write_str(
            "class Foo:\n\
             \x20   def bar(self):\n\
             \x20       return 1\n",
        )
        .expect("write app.py");

    tmp.child("tests/test_app.py")
        .write_str(
            "from src.app import Foo\n\
             \n\
             def test_bar():\n\
             \x20   assert Foo().bar() == 1\n",
        )
        .expect("write test_app.py");

    tmp.child("README.md")
        .write_str("# Demo\n\nSmall fixture.\n")
        .expect("write README.md");

    tmp
}

/// Three files across the three categories
pub fn make_three_file_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("lib/core.py")
        .write_str("def run(a, b):\n    return a + b\n")
        .expect("write core.py");
    tmp.child("lib/test_core.py")
        .write_str("def test_run():\n    assert True\n")
        .expect("write test_core.py");
    tmp.child("config.yaml")
        .write_str("name: demo\nlevel: 3\n")
        .expect("write config.yaml");

    tmp
}

/// Defaults widened to docs and config, for `root`
pub fn config_for(root: &std::path::Path) -> PipelineConfig
{
    let mut s = Settings::default();
    s.allowed_extensions
        .extend([".md".to_string(), ".yaml".to_string()]);
    s.into_pipeline_config(root, false)
}

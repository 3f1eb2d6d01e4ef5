//! Descriptor accounting for the orchestrating process. Kept in its own
//! test binary so no other test opens descriptors concurrently.

#![cfg(target_os = "linux")]

use std::fs;

use rpipe::{run, Config};

fn open_descriptors() -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("procfs available")
        .count()
}

#[test]
fn orchestrator_leaks_no_pipe_ends() {
    let config = Config::default();
    let before = open_descriptors();

    let result = run(&["echo", "hi", "|", "cat", "|", "wc", "-c", "|", "true"], &config)
        .expect("pipeline runs");
    assert_eq!(result.stages().len(), 4);
    let missing = run(&["rpipe-missing-7", "|", "true", "|", "true"], &config).expect("pipeline runs");
    assert!(!missing.success());

    assert_eq!(open_descriptors(), before);
}

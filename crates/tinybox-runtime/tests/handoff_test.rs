//! Integration tests for container bootstrap and the master-to-init handoff.
//!
//! Everything here runs unprivileged: no namespaces are created and cgroups
//! are rooted in a scratch directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tinybox_common::config::{ContainerOptions, InvocationMode, Settings};
use tinybox_common::error::TinyboxError;
use tinybox_common::types::{CgroupOptions, ContainerRecord};
use tinybox_runtime::container::Container;
use tinybox_runtime::process::ProcessRole;

fn settings(base: &Path) -> Settings {
    let mut settings = Settings::new(base);
    settings.cgroup_root = base.join("cgroup");
    settings
}

fn web1() -> ContainerOptions {
    ContainerOptions {
        name: "web1".into(),
        rootfs: "/srv/web1root".into(),
        path: "/bin/sh".into(),
        argv: vec!["sh".into(), "-c".into(), "echo hi".into()],
        hostname: "web1".into(),
        cgroup: CgroupOptions {
            memory: Some(0),
            ..CgroupOptions::default()
        },
        ..ContainerOptions::default()
    }
}

fn name_only(name: &str) -> ContainerOptions {
    ContainerOptions {
        name: name.into(),
        ..ContainerOptions::default()
    }
}

fn inode(path: &Path) -> u64 {
    std::fs::symlink_metadata(path).unwrap().ino()
}

// ── Bootstrap ────────────────────────────────────────────────────────

#[test]
fn construction_produces_control_files_and_spawn_spec() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());
    let c = Container::new(&s, web1()).unwrap();

    assert_eq!(c.dir(), base.path().join("web1"));
    assert!(
        std::fs::symlink_metadata(c.pipe_file())
            .unwrap()
            .file_type()
            .is_fifo()
    );
    assert!(c.lock_file().is_file());
    assert!(!c.state_file().exists());

    let record = c.record();
    assert_eq!(record.rootfs, Path::new("/srv/web1root"));
    assert_eq!(record.path, "/bin/sh");
    assert_eq!(record.argv, vec!["sh", "-c", "echo hi"]);
    assert_eq!(record.hostname, "web1");
    assert_eq!(record.cgroup_prefix, "tinybox");
    assert!(record.pid.is_none());
}

#[test]
fn master_role_accepts_non_negative_memory() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());
    let mut c = Container::new(&s, web1()).unwrap();
    c.select_role(ProcessRole::Master, &s).unwrap();
    assert_eq!(c.role(), Some(ProcessRole::Master));
}

#[test]
fn second_construction_reuses_control_files() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());

    let first = Container::new(&s, web1()).unwrap();
    let before = [
        inode(first.dir()),
        inode(&first.pipe_file()),
        inode(&first.lock_file()),
    ];
    drop(first);

    let second = Container::new(&s, web1()).unwrap();
    let after = [
        inode(second.dir()),
        inode(&second.pipe_file()),
        inode(&second.lock_file()),
    ];
    assert_eq!(before, after);
}

// ── Re-exec ──────────────────────────────────────────────────────────

#[test]
fn re_exec_never_inherits_spawn_spec_from_disk() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());
    Container::new(&s, web1()).unwrap().persist().unwrap();

    let opts = ContainerOptions {
        name: "web1".into(),
        path: "/bin/ls".into(),
        argv: vec!["ls".into(), "-l".into()],
        mode: InvocationMode::ReExec,
        ..ContainerOptions::default()
    };
    let c = Container::new(&s, opts).unwrap();
    let record = c.record();

    assert!(record.path.is_empty());
    assert!(record.argv.is_empty());
    assert!(record.hostname.is_empty());
    assert!(record.rootfs.as_os_str().is_empty());
    assert_eq!(record.name, "web1");
    assert_eq!(record.cgroup_prefix, "tinybox");
    assert_eq!(c.command(), ["ls".to_string(), "-l".to_string()]);
}

// ── Pipe handoff ─────────────────────────────────────────────────────

/// Publishes `opts` from a writer thread and checks that it stays blocked
/// until a reader arrives, then returns what the reader decoded.
fn hand_off_once(s: &Settings, opts: ContainerOptions) -> ContainerRecord {
    let (done_tx, done_rx) = mpsc::channel();
    let writer_settings = s.clone();
    let writer = thread::spawn(move || {
        let master = Container::new(&writer_settings, opts).unwrap();
        let sent = master.record().clone();
        master.publish_state().unwrap();
        done_tx.send(sent).unwrap();
    });

    thread::sleep(Duration::from_millis(200));
    assert!(
        done_rx.try_recv().is_err(),
        "write completed before any reader opened the pipe"
    );

    let mut init = Container::new(s, name_only("web1")).unwrap();
    init.wait_for_state().unwrap();
    writer.join().unwrap();

    let sent = done_rx.recv().unwrap();
    assert_eq!(init.record(), &sent);
    sent
}

#[test]
fn publish_blocks_until_reader_and_pipe_is_reusable() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());

    let first = hand_off_once(&s, web1());
    assert_eq!(first.argv, vec!["sh", "-c", "echo hi"]);

    let second = hand_off_once(
        &s,
        ContainerOptions {
            argv: Vec::new(),
            hostname: "web1-again".into(),
            ..web1()
        },
    );
    assert!(second.argv.is_empty());
    assert_eq!(second.hostname, "web1-again");
}

// ── Validation gate ──────────────────────────────────────────────────

#[test]
fn invalid_limits_fail_master_selection_without_side_effects() {
    let base = tempfile::tempdir().unwrap();
    let s = settings(base.path());
    let opts = ContainerOptions {
        cgroup: CgroupOptions {
            memory: Some(-1),
            ..CgroupOptions::default()
        },
        ..web1()
    };
    let mut c = Container::new(&s, opts).unwrap();

    let err = c.select_role(ProcessRole::Master, &s).unwrap_err();
    assert!(matches!(err, TinyboxError::Validation { .. }));
    assert_eq!(c.role(), None);
    assert!(!s.cgroup_root.exists());
    assert!(c.record().pid.is_none());
    assert!(matches!(c.run(), Err(TinyboxError::Config { .. })));
}

// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Behaviour shared by every key/value backend.

use std::sync::Arc;

use kvlite_kv::{DirKv, KvBackend, KvStore, MemoryKv};
use rstest::rstest;
use tempfile::TempDir;

enum Kind {
    Memory,
    Directory,
}

fn make_store(kind: Kind) -> (Arc<dyn KvStore>, Option<TempDir>) {
    match kind {
        Kind::Memory => (Arc::new(MemoryKv::new()), None),
        Kind::Directory => {
            let dir = tempfile::tempdir().unwrap();
            let kv = DirKv::open(dir.path().join("kv")).unwrap();
            (Arc::new(kv), Some(dir))
        }
    }
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::directory(Kind::Directory)]
fn set_get_remove(#[case] kind: Kind) {
    let (kv, _dir) = make_store(kind);

    kv.set("kvvfs-local-1", b"page one").unwrap();
    kv.set("kvvfs-local-1", b"page one, again").unwrap();
    assert_eq!(
        kv.get("kvvfs-local-1").unwrap().as_deref(),
        Some(&b"page one, again"[..])
    );

    kv.remove("kvvfs-local-1").unwrap();
    assert_eq!(kv.get("kvvfs-local-1").unwrap(), None);
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::directory(Kind::Directory)]
fn prefix_size_and_clear(#[case] kind: Kind) {
    let (kv, _dir) = make_store(kind);

    kv.set("kvvfs-local-sz", b"8192").unwrap();
    kv.set("kvvfs-local-1", &[1u8; 4096]).unwrap();
    kv.set("kvvfs-session-1", &[2u8; 4096]).unwrap();
    kv.set("unrelated", b"keep me").unwrap();

    let local = kv.size_of_prefix("kvvfs-local-").unwrap();
    assert_eq!(
        local,
        ("kvvfs-local-sz".len() + 4 + "kvvfs-local-1".len() + 4096) as u64
    );

    assert_eq!(kv.clear_prefix("kvvfs-").unwrap(), 3);
    assert_eq!(kv.keys().unwrap(), vec!["unrelated".to_string()]);
}

#[test]
fn directory_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let backend = KvBackend::Directory {
        path: dir.path().join("store"),
    };

    backend.build().unwrap().set("answer", b"42").unwrap();

    let reopened = backend.build().unwrap();
    assert_eq!(reopened.get("answer").unwrap().as_deref(), Some(&b"42"[..]));
    assert!(backend.is_durable());
}

#[test]
fn backend_from_toml() {
    let backend: KvBackend = toml::from_str(r#"kind = "directory"
path = "/tmp/kvlite""#)
    .unwrap();
    assert_eq!(
        backend,
        KvBackend::Directory {
            path: "/tmp/kvlite".into()
        }
    );

    let memory: KvBackend = toml::from_str(r#"kind = "memory""#).unwrap();
    assert!(!memory.is_durable());
}

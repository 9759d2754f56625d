// End-to-end store behaviour against a real temp directory: tracking
// chains, reconstruction, restore, deletion, and the exact on-disk
// record sizes.

use fiver::store::{Store, StoreError, additive_checksum};
use fiver::wire::METADATA_LEN;
use tempfile::tempdir;

fn lcg_data(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..size)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as u8
        })
        .collect()
}

#[test]
fn track_and_reconstruct_appended_chain() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    // Each revision is the previous one with one character appended.
    store.track("note", b"v1", "first").unwrap();
    store.track("note", b"v12", "second").unwrap();
    store.track("note", b"v123", "third").unwrap();

    assert_eq!(store.reconstruct("note", 1).unwrap(), b"v1");
    assert_eq!(store.reconstruct("note", 2).unwrap(), b"v12");
    assert_eq!(store.reconstruct("note", 3).unwrap(), b"v123");
}

#[test]
fn on_disk_record_sizes() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    store.track("data.bin", b"hello wire", "").unwrap();

    // Revision 1 is a single INSERT: 12-byte header plus the payload.
    let delta_file = dir.path().join("data.bin_v1.delta");
    assert_eq!(
        std::fs::read(&delta_file).unwrap().len(),
        12 + "hello wire".len()
    );

    // Metadata is always the fixed record.
    let meta_file = dir.path().join("data.bin_v1.meta");
    assert_eq!(std::fs::read(&meta_file).unwrap().len(), METADATA_LEN);
}

#[test]
fn second_revision_stores_only_the_change() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let base = lcg_data(64 * 1024, 7);
    let mut edited = base.clone();
    for b in &mut edited[32_000..32_006] {
        *b = b.wrapping_add(1);
    }

    store.track("big", &base, "").unwrap();
    let receipt = store.track("big", &edited, "").unwrap();

    assert_eq!(receipt.version, 2);
    assert!(receipt.operation_count <= 3);
    assert!(receipt.delta_size <= 6);
    assert_eq!(store.reconstruct("big", 2).unwrap(), edited);
}

#[test]
fn metadata_roundtrips_through_disk() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let base = b"reference bytes for checksum";
    store.track("f", base, "init").unwrap();
    store.track("f", b"reference bytes for checksum!!", "grow").unwrap();

    let meta = store.metadata("f", 2).unwrap();
    assert_eq!(meta.filename, "f");
    assert_eq!(meta.version, 2);
    assert_eq!(meta.original_size as usize, base.len());
    assert_eq!(meta.checksum, additive_checksum(base));
    assert_eq!(meta.message, "grow");
    assert!(meta.timestamp > 0);
}

#[test]
fn restore_writes_the_requested_revision() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.track("doc", b"old contents", "").unwrap();
    store.track("doc", b"new contents, longer", "").unwrap();

    let out = dir.path().join("restored.txt");
    let written = store.restore_to("doc", 1, &out).unwrap();
    assert_eq!(written, "old contents".len());
    assert_eq!(std::fs::read(&out).unwrap(), b"old contents");
}

#[test]
fn sanitised_names_land_in_one_flat_directory() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.track("dir/inner.txt", b"nested", "").unwrap();
    assert!(dir.path().join("dir_inner.txt_v1.meta").exists());
    assert!(dir.path().join("dir_inner.txt_v1.delta").exists());

    // The original name stays the lookup key.
    assert_eq!(store.reconstruct("dir/inner.txt", 1).unwrap(), b"nested");
}

#[test]
fn independent_files_keep_independent_chains() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.track("a", b"alpha", "").unwrap();
    store.track("b", b"beta", "").unwrap();
    store.track("a", b"alpha 2", "").unwrap();

    assert_eq!(store.versions("a").unwrap(), vec![1, 2]);
    assert_eq!(store.versions("b").unwrap(), vec![1]);

    let summaries = store.list().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "a");
    assert_eq!(summaries[0].version_count, 2);
    assert_eq!(summaries[1].name, "b");
    assert_eq!(summaries[1].version_count, 1);
}

#[test]
fn delete_version_shrinks_history() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.track("f", b"one", "").unwrap();
    store.track("f", b"two", "").unwrap();
    store.delete_version("f", 2).unwrap();

    assert_eq!(store.versions("f").unwrap(), vec![1]);
    assert!(matches!(
        store.reconstruct("f", 2),
        Err(StoreError::Engine(_))
    ));
}

#[test]
fn large_random_chain_survives_many_revisions() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let mut current = lcg_data(128 * 1024, 99);
    let mut revisions = vec![current.clone()];
    store.track("blob", &current, "").unwrap();

    for round in 0u64..5 {
        // Mutate a different region each round and append a little.
        let at = 10_000 + (round as usize) * 15_000;
        for b in &mut current[at..at + 64] {
            *b = b.wrapping_mul(3).wrapping_add(1);
        }
        current.extend_from_slice(&lcg_data(512, round + 1));
        store.track("blob", &current, "").unwrap();
        revisions.push(current.clone());
    }

    for (i, expected) in revisions.iter().enumerate() {
        assert_eq!(
            &store.reconstruct("blob", (i + 1) as u32).unwrap(),
            expected,
            "revision {}",
            i + 1
        );
    }
}

#[test]
fn empty_file_revisions_are_representable() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.track("f", b"", "empty start").unwrap();
    store.track("f", b"now has content", "").unwrap();
    store.track("f", b"", "emptied again").unwrap();

    assert_eq!(store.reconstruct("f", 1).unwrap(), b"");
    assert_eq!(store.reconstruct("f", 2).unwrap(), b"now has content");
    assert_eq!(store.reconstruct("f", 3).unwrap(), b"");

    // The emptied revision is a zero-operation delta.
    let meta = store.metadata("f", 3).unwrap();
    assert_eq!(meta.operation_count, 0);
    assert_eq!(meta.delta_size, 0);
}

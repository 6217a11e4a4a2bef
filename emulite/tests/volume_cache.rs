//! Integration tests for the blobstore volume cache.
//!
//! Most tests drive the real `ExternalVolumeTools` against the fake `fvm` and
//! `qemu-img` scripts from the SDK fixture; the recording fake is used where
//! the exact call sequence matters.

use emulite::disk::{BlobstoreCache, compute_file_hash, ensure_extended_volume};
use emulite::{EmuliteError, TargetArch};
use emulite_test_utils::{BLOBSTORE_CONTENTS, RecordingVolumeTools, SdkFixture, ToolCall};

const ARCH: TargetArch = TargetArch::X64;

#[test]
fn first_launch_builds_extended_image() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    let image = ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    assert_eq!(image, fixture.cached_image());
    let mut expected = BLOBSTORE_CONTENTS.to_vec();
    expected.extend_from_slice(b"extended 1073741824\n");
    assert_eq!(std::fs::read(&image).unwrap(), expected);

    let stored = std::fs::read_to_string(fixture.cached_hash()).unwrap();
    assert_eq!(stored.trim(), compute_file_hash(&source).unwrap());

    // Source volume is never touched.
    assert_eq!(std::fs::read(&source).unwrap(), BLOBSTORE_CONTENTS);
}

#[test]
fn tool_command_lines() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    let calls = fixture.tool_calls();
    assert_eq!(calls.len(), 2);

    let fvm: Vec<&str> = calls[0].split(' ').collect();
    assert_eq!(fvm[0], "fvm");
    assert_ne!(fvm[1], source.to_str().unwrap());
    assert_eq!(&fvm[2..5], ["extend", "--length", "1073741824"]);
    assert_eq!(fvm[5], source.to_str().unwrap());

    let qemu_img: Vec<&str> = calls[1].split(' ').collect();
    assert_eq!(
        &qemu_img[..7],
        ["qemu-img", "convert", "-f", "raw", "-O", "qcow2", "-c"]
    );
    // Converts the copy fvm just extended.
    assert_eq!(qemu_img[7], fvm[1]);
}

#[test]
fn unchanged_source_reuses_cache() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    let first = ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();
    let second = ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    assert_eq!(first, second);
    assert_eq!(fixture.call_count("fvm"), 1);
    assert_eq!(fixture.call_count("qemu-img"), 1);
}

#[test]
fn changed_source_invalidates_cache() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();
    fixture.write_blobstore(ARCH, b"rebuilt blobstore\n");
    let image = ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    assert_eq!(fixture.call_count("qemu-img"), 2);
    assert!(
        std::fs::read_to_string(&image)
            .unwrap()
            .starts_with("rebuilt blobstore\n")
    );
    let stored = std::fs::read_to_string(fixture.cached_hash()).unwrap();
    assert_eq!(stored.trim(), compute_file_hash(&source).unwrap());
}

#[test]
fn deleted_image_is_rebuilt() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();
    std::fs::remove_file(fixture.cached_image()).unwrap();
    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    assert!(fixture.cached_image().is_file());
    assert_eq!(fixture.call_count("qemu-img"), 2);
}

#[test]
fn failed_conversion_leaves_no_hash() {
    let fixture = SdkFixture::new();
    fixture.break_qemu_img();
    let tools = fixture.options().volume_tools();

    let err =
        ensure_extended_volume(&fixture.blobstore_source(ARCH), &fixture.output_dir(), &tools)
            .unwrap_err();

    match err {
        EmuliteError::ToolExecution { command, stderr, .. } => {
            assert!(command.contains("convert"));
            assert!(stderr.contains("Could not open"));
        }
        other => panic!("expected ToolExecution, got {:?}", other),
    }
    assert!(!fixture.cached_hash().exists());
    assert!(!fixture.cached_image().exists());
}

#[test]
fn failed_conversion_keeps_previous_hash() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);

    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();
    let old_hash = std::fs::read_to_string(fixture.cached_hash()).unwrap();

    fixture.write_blobstore(ARCH, b"new contents\n");
    fixture.break_qemu_img();
    assert!(ensure_extended_volume(&source, &fixture.output_dir(), &tools).is_err());

    assert_eq!(
        std::fs::read_to_string(fixture.cached_hash()).unwrap(),
        old_hash
    );
    // The stale image no longer matches the source, so the next attempt retries.
    let recording = RecordingVolumeTools::new();
    ensure_extended_volume(&source, &fixture.output_dir(), &recording).unwrap();
    assert_eq!(recording.convert_count(), 1);
}

#[test]
fn missing_tool_is_not_found() {
    let fixture = SdkFixture::new();
    let mut options = fixture.options();
    options.fvm_tool = Some(fixture.root().join("no-such-fvm"));

    let err = ensure_extended_volume(
        &fixture.blobstore_source(ARCH),
        &fixture.output_dir(),
        &options.volume_tools(),
    )
    .unwrap_err();

    assert!(matches!(err, EmuliteError::NotFound(_)));
    assert!(!fixture.cached_hash().exists());
}

#[test]
fn missing_source_fails_before_any_tool_runs() {
    let fixture = SdkFixture::new();
    let tools = RecordingVolumeTools::new();

    let err = ensure_extended_volume(
        &fixture.root().join("missing.blk"),
        &fixture.output_dir(),
        &tools,
    )
    .unwrap_err();

    assert!(matches!(err, EmuliteError::NotFound(_)));
    assert!(tools.calls().is_empty());
}

#[test]
fn extend_runs_on_a_copy_before_conversion() {
    let fixture = SdkFixture::new();
    let tools = RecordingVolumeTools::new();
    let source = fixture.blobstore_source(ARCH);

    ensure_extended_volume(&source, &fixture.output_dir(), &tools).unwrap();

    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    let ToolCall::Extend {
        volume,
        length,
        original,
    } = &calls[0]
    else {
        panic!("expected extend first, got {:?}", calls[0]);
    };
    let ToolCall::Convert { source: converted, .. } = &calls[1] else {
        panic!("expected convert second, got {:?}", calls[1]);
    };

    assert_eq!(*length, 1024 * 1024 * 1024);
    assert_eq!(original, &source);
    assert_ne!(volume, &source);
    assert_eq!(converted, volume);
    // Scratch copy is gone once the call returns.
    assert!(!volume.exists());
}

#[test]
fn custom_extended_size() {
    let fixture = SdkFixture::new();
    let tools = RecordingVolumeTools::new();

    BlobstoreCache::new(&fixture.output_dir(), &tools)
        .with_extended_size(4096)
        .ensure(&fixture.blobstore_source(ARCH))
        .unwrap();

    assert!(matches!(
        tools.calls()[0],
        ToolCall::Extend { length: 4096, .. }
    ));
}

#[test]
fn concurrent_launches_convert_once() {
    let fixture = SdkFixture::new();
    let tools = fixture.options().volume_tools();
    let source = fixture.blobstore_source(ARCH);
    let output_dir = fixture.output_dir();

    let images: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| ensure_extended_volume(&source, &output_dir, &tools)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert!(images.iter().all(|image| image == &fixture.cached_image()));
    assert_eq!(fixture.call_count("qemu-img"), 1);
}

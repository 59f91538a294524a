use std::collections::HashMap;

use common::{LoaderKind, Side};
use vault::error::VaultError;
use vault::models::BundleMeta;
use vault::services;

use crate::support::{
    TestVault, instance_id, meta, upload, zip_bundle, zip_declaring, zip_understating,
};

/// A stored ZIP whose `second.jar` payload fails its CRC check on extraction.
fn bundle_with_corrupt_second_entry() -> Vec<u8> {
    let mut data = zip_bundle(&[
        ("mods/first.jar", b"FIRST-PAYLOAD"),
        ("mods/second.jar", b"SECOND-PAYLOAD"),
    ]);
    let at = data
        .windows(b"SECOND-PAYLOAD".len())
        .position(|w| w == b"SECOND-PAYLOAD")
        .unwrap();
    data[at] ^= 0xFF;
    data
}

mod bundle_upload {
    use super::*;

    #[tokio::test]
    async fn first_upload_stores_every_entry() {
        let vault = TestVault::spawn().await;

        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[("mods/jei.jar", b"jei"), ("config/jei.toml", b"a = 1")]),
            )
            .await;

        assert_eq!(report.instance_id, "test-pack-1-20-1");
        assert_eq!(report.new_object_count, 2);
        assert_eq!(report.deduped_count, 0);
        assert_eq!(report.skipped_entries, 0);
        assert_eq!(vault.blob_count().await, 2);
        assert_eq!(vault.object_count().await, 2);
    }

    #[tokio::test]
    async fn same_bundle_twice_is_fully_deduplicated() {
        let vault = TestVault::spawn().await;
        let bundle = zip_bundle(&[
            ("mods/jei.jar", b"jei"),
            ("mods/create.jar", b"create"),
            ("config/create.toml", b"speed = 2"),
        ]);

        let first = vault.ingest("Test Pack", bundle.clone()).await;
        let blobs_after_first = vault.blob_count().await;
        let second = vault.ingest("Test Pack", bundle).await;

        assert_eq!(second.new_object_count, 0);
        assert_eq!(second.deduped_count, first.new_object_count);
        assert_eq!(vault.blob_count().await, blobs_after_first);

        let files = services::list_files(&vault.state, &second.instance_id)
            .await
            .unwrap();
        assert_eq!(files.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_content_within_a_bundle_is_stored_once() {
        let vault = TestVault::spawn().await;

        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[("mods/a.jar", b"same"), ("mods/b.jar", b"same")]),
            )
            .await;

        assert_eq!(report.new_object_count, 1);
        assert_eq!(report.deduped_count, 1);
        assert_eq!(vault.blob_count().await, 1);

        let files = services::list_files(&vault.state, &report.instance_id)
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].hash, files[1].hash);
    }

    #[tokio::test]
    async fn content_shared_across_instances_is_stored_once() {
        let vault = TestVault::spawn().await;

        vault
            .ingest("Pack A", zip_bundle(&[("mods/jei.jar", b"jei")]))
            .await;
        let second = vault
            .ingest(
                "Pack B",
                zip_bundle(&[("mods/jei.jar", b"jei"), ("mods/other.jar", b"other")]),
            )
            .await;

        assert_eq!(second.new_object_count, 1);
        assert_eq!(second.deduped_count, 1);
        assert_eq!(vault.blob_count().await, 2);
    }

    #[tokio::test]
    async fn reupload_replaces_previous_files() {
        let vault = TestVault::spawn().await;

        vault
            .ingest(
                "Test Pack",
                zip_bundle(&[("mods/old.jar", b"old"), ("mods/keep.jar", b"keep")]),
            )
            .await;
        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[("mods/keep.jar", b"keep"), ("mods/new.jar", b"new")]),
            )
            .await;

        let paths: Vec<String> = services::list_files(&vault.state, &report.instance_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["mods/keep.jar", "mods/new.jar"]);
        assert!(!vault.has_blob(b"old").await);
        assert_eq!(vault.object_count().await, 2);
    }

    #[tokio::test]
    async fn reupload_updates_instance_metadata() {
        let vault = TestVault::spawn().await;
        let bundle = zip_bundle(&[("mods/jei.jar", b"jei")]);

        vault.ingest("Test Pack", bundle.clone()).await;
        let updated = BundleMeta {
            loader: LoaderKind::NeoForge,
            loader_version: Some("20.1.5".into()),
            ..meta("Test Pack")
        };
        services::ingest_bundle(&vault.state, upload(bundle), updated)
            .await
            .unwrap();

        let page = services::list_instances(&vault.state, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].loader, LoaderKind::NeoForge);
        assert_eq!(page.items[0].loader_version.as_deref(), Some("20.1.5"));
    }
}

mod path_safety {
    use super::*;

    #[tokio::test]
    async fn traversal_entries_are_never_stored() {
        let vault = TestVault::spawn().await;

        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[
                    ("../../etc/passwd", b"root:x:0:0"),
                    ("mods/jei.jar", b"jei"),
                ]),
            )
            .await;

        assert_eq!(report.skipped_entries, 1);
        assert_eq!(report.new_object_count, 1);
        assert!(!vault.has_blob(b"root:x:0:0").await);

        let files = services::list_files(&vault.state, &report.instance_id)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "mods/jei.jar");
    }

    #[tokio::test]
    async fn archiver_junk_is_skipped() {
        let vault = TestVault::spawn().await;

        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[
                    ("__MACOSX/mods/._jei.jar", b"resource fork"),
                    ("mods/.DS_Store", b"finder"),
                    ("mods/jei.jar", b"jei"),
                ]),
            )
            .await;

        assert_eq!(report.skipped_entries, 2);
        assert_eq!(report.new_object_count, 1);
    }
}

mod side_classification {
    use super::*;

    #[tokio::test]
    async fn entries_are_remapped_and_tagged() {
        let vault = TestVault::spawn().await;

        let report = vault
            .ingest(
                "Test Pack",
                zip_bundle(&[
                    ("client-mods/foo.jar", b"foo"),
                    ("server-mods/bar.jar", b"bar"),
                    ("shaderpacks/bsl.zip", b"bsl"),
                    ("mods/OptiFine_HD_U_I6.jar", b"optifine"),
                    ("mods/jei.jar", b"jei"),
                ]),
            )
            .await;

        let sides: HashMap<String, Side> = services::list_files(&vault.state, &report.instance_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| (f.path, f.side))
            .collect();

        assert_eq!(sides["mods/foo.jar"], Side::Client);
        assert_eq!(sides["mods/bar.jar"], Side::Server);
        assert_eq!(sides["shaderpacks/bsl.zip"], Side::Client);
        assert_eq!(sides["mods/OptiFine_HD_U_I6.jar"], Side::Client);
        assert_eq!(sides["mods/jei.jar"], Side::Both);
        assert!(!sides.contains_key("client-mods/foo.jar"));
    }
}

mod rejection {
    use super::*;

    #[tokio::test]
    async fn ten_gigabytes_from_one_kilobyte_is_a_bomb() {
        let vault = TestVault::spawn().await;
        let bomb = zip_declaring("mods/huge.bin", 10 * 1024 * 1024 * 1024, 1024);

        let result = services::ingest_bundle(&vault.state, upload(bomb), meta("Bomb Pack")).await;

        assert!(matches!(result, Err(VaultError::BombDetected(_))));
        assert_eq!(vault.blob_count().await, 0);
        assert_eq!(vault.object_count().await, 0);
        let page = services::list_instances(&vault.state, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn entry_inflating_past_its_declared_size_is_a_bomb() {
        let vault = TestVault::spawn().await;
        let bomb = zip_understating("mods/quiet.jar", 8 * 1024 * 1024, 4096);

        let result = services::ingest_bundle(&vault.state, upload(bomb), meta("Bomb Pack")).await;

        assert!(matches!(result, Err(VaultError::BombDetected(_))));
        assert_eq!(vault.blob_count().await, 0);
        assert_eq!(vault.object_count().await, 0);
        let page = services::list_instances(&vault.state, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn non_archive_upload_is_unsupported() {
        let vault = TestVault::spawn().await;

        let result = services::ingest_bundle(
            &vault.state,
            upload(b"definitely not an archive".to_vec()),
            meta("Test Pack"),
        )
        .await;

        assert!(matches!(result, Err(VaultError::UnsupportedFormat)));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let vault = TestVault::spawn_with(|config| config.archive.max_upload_bytes = 1024).await;
        let bundle = zip_bundle(&[("mods/big.jar", &[7u8; 4096])]);

        let result = services::ingest_bundle(&vault.state, upload(bundle), meta("Test Pack")).await;

        assert!(matches!(
            result,
            Err(VaultError::SizeExceeded { limit: 1024 })
        ));
        assert_eq!(vault.blob_count().await, 0);
    }

    #[tokio::test]
    async fn title_and_version_without_usable_characters_are_rejected() {
        let vault = TestVault::spawn().await;
        let meta = BundleMeta {
            title: "!!!".into(),
            mc_version: "..".into(),
            loader: LoaderKind::Vanilla,
            loader_version: None,
        };

        let result = services::ingest_bundle(
            &vault.state,
            upload(zip_bundle(&[("a.txt", b"a")])),
            meta,
        )
        .await;

        assert!(matches!(result, Err(VaultError::InvalidInstanceId(_))));
    }
}

mod rollback {
    use super::*;

    #[tokio::test]
    async fn failed_extraction_leaves_no_trace() {
        let vault = TestVault::spawn().await;

        let result = services::ingest_bundle(
            &vault.state,
            upload(bundle_with_corrupt_second_entry()),
            meta("Test Pack"),
        )
        .await;

        assert!(matches!(result, Err(VaultError::CorruptArchive(_))));
        assert!(!vault.has_blob(b"FIRST-PAYLOAD").await);
        assert_eq!(vault.blob_count().await, 0);
        assert_eq!(vault.object_count().await, 0);
        assert!(matches!(
            services::list_files(&vault.state, &instance_id("Test Pack")).await,
            Err(VaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_reupload_keeps_previous_files() {
        let vault = TestVault::spawn().await;
        let first = vault
            .ingest("Test Pack", zip_bundle(&[("mods/a.jar", b"a")]))
            .await;

        let result = services::ingest_bundle(
            &vault.state,
            upload(bundle_with_corrupt_second_entry()),
            meta("Test Pack"),
        )
        .await;
        assert!(result.is_err());

        let files = services::list_files(&vault.state, &first.instance_id)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "mods/a.jar");
        assert!(vault.has_blob(b"a").await);
        assert!(!vault.has_blob(b"FIRST-PAYLOAD").await);
    }
}

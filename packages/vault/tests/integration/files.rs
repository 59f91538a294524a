use std::collections::HashSet;

use bytes::Bytes;
use common::Side;
use vault::error::VaultError;
use vault::models::{FileNode, FileOpStatus};
use vault::services;

use crate::support::{TestVault, zip_bundle};

async fn pack_with(vault: &TestVault, files: &[(&str, &[u8])]) -> String {
    vault.ingest("Test Pack", zip_bundle(files)).await.instance_id
}

async fn file_at(vault: &TestVault, id: &str, path: &str) -> Option<FileNode> {
    services::list_files(&vault.state, id)
        .await
        .unwrap()
        .into_iter()
        .find(|f| f.path == path)
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn files_are_ordered_by_path_with_metadata() {
        let vault = TestVault::spawn().await;
        let id = pack_with(
            &vault,
            &[
                ("mods/zeta.jar", b"zeta"),
                ("config/alpha.toml", b"a = 1"),
                ("mods/beta.jar", b"beta"),
            ],
        )
        .await;

        let files = services::list_files(&vault.state, &id).await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["config/alpha.toml", "mods/beta.jar", "mods/zeta.jar"]);

        assert!(files[0].is_config);
        assert!(!files[1].is_config);
        assert_eq!(files[1].filename, "beta.jar");
        assert_eq!(files[1].size, 4);
        assert_eq!(
            files[1].hash,
            common::storage::ContentHash::compute(b"beta").to_hex()
        );
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let vault = TestVault::spawn().await;
        let result = services::list_files(&vault.state, "missing-pack").await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_instance_id_is_rejected() {
        let vault = TestVault::spawn().await;
        let result = services::list_files(&vault.state, "../etc").await;
        assert!(matches!(result, Err(VaultError::InvalidInstanceId(_))));
    }
}

mod single_file_upload {
    use super::*;

    #[tokio::test]
    async fn new_path_is_installed_on_both_sides() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let response = services::upsert_single_file(
            &vault.state,
            &id,
            "config/new.toml",
            "new.toml",
            Bytes::from_static(b"x = 1"),
        )
        .await
        .unwrap();

        assert_eq!(response.status, FileOpStatus::Uploaded);
        assert_eq!(response.path, "config/new.toml");

        let file = file_at(&vault, &id, "config/new.toml").await.unwrap();
        assert_eq!(file.side, Side::Both);
        assert!(file.is_config);
    }

    #[tokio::test]
    async fn replaced_path_keeps_its_side() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("client-mods/foo.jar", b"foo-v1")]).await;

        services::upsert_single_file(
            &vault.state,
            &id,
            "mods/foo.jar",
            "foo.jar",
            Bytes::from_static(b"foo-v2"),
        )
        .await
        .unwrap();

        let file = file_at(&vault, &id, "mods/foo.jar").await.unwrap();
        assert_eq!(file.side, Side::Client);
        assert_eq!(
            file.hash,
            common::storage::ContentHash::compute(b"foo-v2").to_hex()
        );
        assert!(vault.has_blob(b"foo-v2").await);
        assert!(!vault.has_blob(b"foo-v1").await);
    }

    #[tokio::test]
    async fn path_is_normalized() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let response = services::upsert_single_file(
            &vault.state,
            &id,
            "./config\\b.toml",
            "b.toml",
            Bytes::from_static(b"b"),
        )
        .await
        .unwrap();

        assert_eq!(response.path, "config/b.toml");
    }

    #[tokio::test]
    async fn empty_filename_falls_back_to_path() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        services::upsert_single_file(&vault.state, &id, "mods/b.jar", " ", Bytes::from_static(b"b"))
            .await
            .unwrap();

        let file = file_at(&vault, &id, "mods/b.jar").await.unwrap();
        assert_eq!(file.filename, "b.jar");
    }

    #[tokio::test]
    async fn unsafe_path_is_rejected() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        for path in ["../evil.jar", "/etc/passwd", "C:/boot.ini", ".hidden"] {
            let result = services::upsert_single_file(
                &vault.state,
                &id,
                path,
                "evil.jar",
                Bytes::from_static(b"evil"),
            )
            .await;
            assert!(
                matches!(result, Err(VaultError::PathUnsafe(_))),
                "{path} should be rejected"
            );
        }
        assert!(!vault.has_blob(b"evil").await);
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found_and_leaves_no_blob() {
        let vault = TestVault::spawn().await;

        let result = services::upsert_single_file(
            &vault.state,
            "missing-pack",
            "mods/a.jar",
            "a.jar",
            Bytes::from_static(b"orphan candidate"),
        )
        .await;

        assert!(matches!(result, Err(VaultError::NotFound(_))));
        assert!(!vault.has_blob(b"orphan candidate").await);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let vault = TestVault::spawn_with(|config| config.archive.max_upload_bytes = 8).await;

        let result = services::upsert_single_file(
            &vault.state,
            "any-pack",
            "mods/big.jar",
            "big.jar",
            Bytes::from(vec![1u8; 16]),
        )
        .await;

        assert!(matches!(result, Err(VaultError::SizeExceeded { limit: 8 })));
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn deleting_a_file_reclaims_unshared_content() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a"), ("mods/b.jar", b"b")]).await;

        let response = services::delete_file(&vault.state, &id, "mods/a.jar")
            .await
            .unwrap();

        assert_eq!(response.status, FileOpStatus::Deleted);
        assert!(file_at(&vault, &id, "mods/a.jar").await.is_none());
        assert!(!vault.has_blob(b"a").await);
        assert!(vault.has_blob(b"b").await);
    }

    #[tokio::test]
    async fn content_still_used_elsewhere_is_kept() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"same"), ("mods/copy.jar", b"same")]).await;

        services::delete_file(&vault.state, &id, "mods/a.jar")
            .await
            .unwrap();

        assert!(vault.has_blob(b"same").await);
        assert_eq!(vault.object_count().await, 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let result = services::delete_file(&vault.state, &id, "mods/nope.jar").await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn unsafe_path_is_rejected() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let result = services::delete_file(&vault.state, &id, "../mods/a.jar").await;
        assert!(matches!(result, Err(VaultError::PathUnsafe(_))));
    }
}

mod side_tags {
    use super::*;

    #[tokio::test]
    async fn side_can_be_changed() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/jei.jar", b"jei")]).await;

        let response = services::set_file_side(&vault.state, &id, "mods/jei.jar", Side::Server)
            .await
            .unwrap();

        assert_eq!(response.status, FileOpStatus::SideUpdated);
        let file = file_at(&vault, &id, "mods/jei.jar").await.unwrap();
        assert_eq!(file.side, Side::Server);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/jei.jar", b"jei")]).await;

        let result = services::set_file_side(&vault.state, &id, "mods/nope.jar", Side::Client).await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }
}

mod config_files {
    use super::*;

    #[tokio::test]
    async fn utf8_config_reads_back() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("config/jei.toml", "name = \"ЕИ\"".as_bytes())]).await;

        let text = services::read_config(&vault.state, &id, "config/jei.toml")
            .await
            .unwrap();
        assert_eq!(text, "name = \"ЕИ\"");
    }

    #[tokio::test]
    async fn legacy_cyrillic_config_is_decoded() {
        let vault = TestVault::spawn().await;
        // "привет" in Windows-1251.
        let cp1251: &[u8] = &[0xEF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        let id = pack_with(&vault, &[("config/greeting.txt", cp1251)]).await;

        let text = services::read_config(&vault.state, &id, "config/greeting.txt")
            .await
            .unwrap();
        assert_eq!(text, "привет");
    }

    #[tokio::test]
    async fn update_replaces_content_and_reclaims_the_old_one() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("config/a.toml", b"old = true")]).await;

        let response =
            services::update_config(&vault.state, &id, "config/a.toml", "new = true".into())
                .await
                .unwrap();

        assert_eq!(response.status, FileOpStatus::Updated);
        let text = services::read_config(&vault.state, &id, "config/a.toml")
            .await
            .unwrap();
        assert_eq!(text, "new = true");
        assert!(!vault.has_blob(b"old = true").await);
    }

    #[tokio::test]
    async fn missing_config_is_not_found() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("config/a.toml", b"a")]).await;

        let result = services::read_config(&vault.state, &id, "config/b.toml").await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }
}

mod moving {
    use super::*;

    #[tokio::test]
    async fn file_moves_to_a_free_path() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("client-mods/foo.jar", b"foo")]).await;

        let response = services::move_file(&vault.state, &id, "mods/foo.jar", "mods/disabled/foo.jar")
            .await
            .unwrap();

        assert_eq!(response.status, FileOpStatus::Moved);
        assert_eq!(response.path, "mods/disabled/foo.jar");
        assert!(file_at(&vault, &id, "mods/foo.jar").await.is_none());
        let moved = file_at(&vault, &id, "mods/disabled/foo.jar").await.unwrap();
        assert_eq!(moved.side, Side::Client);
    }

    #[tokio::test]
    async fn moving_onto_a_file_replaces_it() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a"), ("mods/b.jar", b"b")]).await;

        services::move_file(&vault.state, &id, "mods/a.jar", "mods/b.jar")
            .await
            .unwrap();

        let paths: HashSet<String> = services::list_files(&vault.state, &id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, HashSet::from(["mods/b.jar".to_string()]));
        assert!(vault.has_blob(b"a").await);
        assert!(!vault.has_blob(b"b").await);
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let result = services::move_file(&vault.state, &id, "mods/nope.jar", "mods/b.jar").await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn unsafe_destination_is_rejected() {
        let vault = TestVault::spawn().await;
        let id = pack_with(&vault, &[("mods/a.jar", b"a")]).await;

        let result = services::move_file(&vault.state, &id, "mods/a.jar", "../a.jar").await;
        assert!(matches!(result, Err(VaultError::PathUnsafe(_))));
    }
}

mod instances {
    use super::*;

    #[tokio::test]
    async fn instances_are_paginated_with_file_counts() {
        let vault = TestVault::spawn().await;
        vault.ingest("Pack One", zip_bundle(&[("a.txt", b"1")])).await;
        vault
            .ingest("Pack Two", zip_bundle(&[("a.txt", b"1"), ("b.txt", b"2")]))
            .await;
        vault
            .ingest(
                "Pack Three",
                zip_bundle(&[("a.txt", b"1"), ("b.txt", b"2"), ("c.txt", b"3")]),
            )
            .await;

        let first = services::list_instances(&vault.state, 1, 2).await.unwrap();
        let second = services::list_instances(&vault.state, 2, 2).await.unwrap();

        assert_eq!(first.total, 3);
        assert_eq!(first.pages, 2);
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items.len(), 1);

        let counts: Vec<(String, u64)> = first
            .items
            .into_iter()
            .chain(second.items)
            .map(|i| (i.id, i.files_count))
            .collect();
        let counts: std::collections::HashMap<_, _> = counts.into_iter().collect();
        assert_eq!(counts["pack-one-1-20-1"], 1);
        assert_eq!(counts["pack-two-1-20-1"], 2);
        assert_eq!(counts["pack-three-1-20-1"], 3);
    }

    #[tokio::test]
    async fn paging_arguments_are_checked() {
        let vault = TestVault::spawn().await;

        for (page, size) in [(0, 10), (1, 0), (1, 101)] {
            let result = services::list_instances(&vault.state, page, size).await;
            assert!(
                matches!(result, Err(VaultError::InvalidArgument(_))),
                "page {page} size {size} should be rejected"
            );
        }
        let empty = services::list_instances(&vault.state, 1, 100).await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.pages, 0);
        assert!(empty.items.is_empty());
    }
}

use contactsync_harness::{ContactBuilder, TestMirror, contact, tag, ts};

type TestResult = Result<(), Box<dyn std::error::Error>>;

// ============================================================================
// Convergence
// ============================================================================

#[test]
fn first_sync_mirrors_the_snapshot() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![
            ContactBuilder::new(1, "ada@example.com", "2024-01-02T10:00:00Z")
                .locale("en")
                .source_url("https://example.com/optin")
                .unsubscribed(false)
                .field("first_name", "Ada")
                .field("postcode", 75011)
                .tag(10)
                .build(),
            contact(2, "bob@example.com", "2024-02-03T11:30:00Z"),
        ],
        vec![tag(10, "customer")],
    );

    let report = mirror.sync();
    assert!(report.is_success(), "{}", report.message());
    assert_eq!(report.fetched, 2);
    assert_eq!(report.labels, 1);

    let ada = mirror.contact(1)?.expect("contact 1 mirrored");
    assert_eq!(ada.email, "ada@example.com");
    assert_eq!(ada.registered_at, ts("2024-01-02T10:00:00Z"));
    assert_eq!(ada.locale.as_deref(), Some("en"));
    assert_eq!(ada.source_url.as_deref(), Some("https://example.com/optin"));
    assert_eq!(ada.unsubscribed, Some(false));
    assert_eq!(ada.bounced, None);
    assert_eq!(ada.fields.get("first_name"), Some("Ada"));
    assert_eq!(ada.fields.get("postcode"), Some("75011"));
    assert!(ada.tags.contains("customer"));

    assert_eq!(mirror.ids()?, vec![1, 2]);
    assert!(!mirror.staging_exists()?);
    Ok(())
}

#[test]
fn repeated_syncs_of_an_unchanged_snapshot_are_idempotent() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![
            ContactBuilder::new(1, "a@example.com", "2024-01-01T00:00:00Z").tag(1).build(),
            contact(2, "b@example.com", "2024-01-02T00:00:00Z"),
            contact(2, "b-old@example.com", "2023-01-02T00:00:00Z"),
        ],
        vec![tag(1, "lead")],
    );

    assert!(mirror.sync().is_success());
    let first = mirror.digest()?;

    let second = mirror.sync();
    assert!(second.is_success());
    assert_eq!(mirror.digest()?, first);

    let stats = second.merge.expect("merge ran");
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.updated, 2);
    Ok(())
}

#[test]
fn contacts_missing_from_a_later_snapshot_are_kept() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![
            contact(1, "a@example.com", "2024-01-01T00:00:00Z"),
            contact(2, "b@example.com", "2024-01-01T00:00:00Z"),
        ],
        vec![],
    );
    assert!(mirror.sync().is_success());

    mirror.set_snapshot(vec![contact(3, "c@example.com", "2024-03-01T00:00:00Z")], vec![]);
    assert!(mirror.sync().is_success());

    assert_eq!(mirror.ids()?, vec![1, 2, 3]);
    assert_eq!(mirror.contact(2)?.map(|c| c.email), Some("b@example.com".to_string()));
    Ok(())
}

// ============================================================================
// Deduplication and overwrite
// ============================================================================

#[test]
fn latest_registration_wins_within_a_snapshot() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![
            contact(7, "a@x", "2024-06-01T00:00:00Z"),
            contact(7, "b@x", "2023-01-01T00:00:00Z"),
        ],
        vec![],
    );

    let report = mirror.sync();
    let stats = report.merge.expect("merge ran");
    assert_eq!(stats.staged, 2);
    assert_eq!(stats.deduplicated, 1);

    let row = mirror.contact(7)?.expect("contact 7 mirrored");
    assert_eq!(row.email, "a@x");
    assert_eq!(mirror.contacts()?.len(), 1);
    Ok(())
}

#[test]
fn matched_rows_are_overwritten_in_full() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![
            ContactBuilder::new(1, "a@example.com", "2024-01-01T00:00:00Z")
                .locale("fr")
                .bounced(true)
                .field("city", "Lyon")
                .tag(5)
                .build(),
        ],
        vec![tag(5, "vip")],
    );
    assert!(mirror.sync().is_success());
    assert!(mirror.contact(1)?.expect("mirrored").tags.contains("vip"));

    // Same contact, tag removed and attributes cleared upstream.
    mirror.set_snapshot(vec![contact(1, "a@example.com", "2024-01-01T00:00:00Z")], vec![tag(5, "vip")]);
    assert!(mirror.sync().is_success());

    let row = mirror.contact(1)?.expect("mirrored");
    assert!(row.tags.is_empty());
    assert_eq!(row.locale, None);
    assert_eq!(row.bounced, None);
    assert!(row.fields.is_empty());
    Ok(())
}

#[test]
fn unresolvable_tag_ids_become_unknown_label() -> TestResult {
    let mut mirror = TestMirror::new()?;
    mirror.set_snapshot(
        vec![ContactBuilder::new(1, "a@example.com", "2024-01-01T00:00:00Z").tag(1).tag(99).build()],
        vec![tag(1, "newsletter")],
    );
    assert!(mirror.sync().is_success());

    let row = mirror.contact(1)?.expect("mirrored");
    let tags: Vec<&str> = row.tags.iter().collect();
    assert_eq!(tags, vec!["newsletter", "unknown label"]);
    Ok(())
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn mirror_survives_reopening_the_database() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("mirror.db");

    let digest = {
        let mut mirror = TestMirror::open(&path)?;
        mirror.set_snapshot(vec![contact(1, "a@example.com", "2024-01-01T00:00:00Z")], vec![]);
        assert!(mirror.sync().is_success());
        mirror.digest()?
    };

    let mut reopened = TestMirror::open(&path)?;
    assert_eq!(reopened.digest()?, digest);

    reopened.set_snapshot(vec![contact(2, "b@example.com", "2024-01-02T00:00:00Z")], vec![]);
    assert!(reopened.sync().is_success());
    assert_eq!(reopened.ids()?, vec![1, 2]);
    Ok(())
}

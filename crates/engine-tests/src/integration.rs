#[cfg(test)]
mod tests {
    use crate::{
        pg_store,
        utils::{
            CancelAfter, csv_from_rows, forgetful_orchestrator, import, orchestrator,
            products_csv, products_csv_named, write_upload,
        },
    };
    use connectors::{memory::MemoryProductStore, store::ProductStore};
    use engine_runtime::source::ImportSource;
    use model::{core::identifiers::TaskId, execution::task::ImportState};
    use std::{sync::Arc, time::Duration};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    // Scenario: An upload with 250 distinct SKUs, imported in batches of 100.
    // Expected Outcome:
    // - The task succeeds with every row processed and imported.
    // - The store holds exactly 250 products.
    #[traced_test]
    #[tokio::test]
    async fn unique_skus_land_as_one_row_each() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        let snapshot = import(&orchestrator, products_csv(250)).await;

        assert_eq!(snapshot.state, ImportState::Success);
        assert_eq!(snapshot.processed, 250);
        assert_eq!(snapshot.total, Some(250));
        assert_eq!(snapshot.imported, 250);
        assert_eq!(snapshot.error_count, 0);
        assert_eq!(store.count().await.unwrap(), 250);
    }

    // Scenario: The same SKUs are uploaded twice, the second time with new names.
    // Expected Outcome:
    // - The row count does not change.
    // - Every product carries the second upload's name.
    #[traced_test]
    #[tokio::test]
    async fn reupload_overwrites_instead_of_duplicating() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 40);

        import(&orchestrator, products_csv(120)).await;
        let second = import(&orchestrator, products_csv_named(120, "Renamed")).await;

        assert_eq!(second.state, ImportState::Success);
        assert_eq!(second.imported, 120);
        assert_eq!(store.count().await.unwrap(), 120);

        let row = store.get_by_sku_ci("sku-77").await.unwrap().unwrap();
        assert_eq!(row.name, "Renamed 77");
        assert!(store.rows().await.iter().all(|r| r.name.starts_with("Renamed")));
    }

    // Scenario: "ABC-1" is imported, then a second upload carries "abc-1".
    // Expected Outcome: One row whose name and description come from the second upload.
    #[traced_test]
    #[tokio::test]
    async fn sku_matching_ignores_case_across_uploads() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        import(&orchestrator, csv_from_rows(&[("Gadget", "ABC-1", "original")])).await;
        import(&orchestrator, csv_from_rows(&[("Gadget Pro", "abc-1", "revised")])).await;

        assert_eq!(store.count().await.unwrap(), 1);
        let row = store.get_by_sku_ci("Abc-1").await.unwrap().unwrap();
        assert_eq!(row.name, "Gadget Pro");
        assert_eq!(row.description, "revised");
        assert_eq!(row.sku_key, "abc-1");
    }

    // Scenario: "Widget"/"W-1" and "Widget2"/"w-1" fall into the same batch of 100.
    // Expected Outcome: One row named "Widget2" under key "w-1" with description "d2".
    #[traced_test]
    #[tokio::test]
    async fn duplicate_skus_in_one_batch_keep_the_last_row() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        let snapshot = import(
            &orchestrator,
            csv_from_rows(&[("Widget", "W-1", "d1"), ("Widget2", "w-1", "d2")]),
        )
        .await;

        assert_eq!(snapshot.state, ImportState::Success);
        assert_eq!(snapshot.processed, 2);
        assert_eq!(store.count().await.unwrap(), 1);

        let row = store.get_by_sku_ci("W-1").await.unwrap().unwrap();
        assert_eq!(row.name, "Widget2");
        assert_eq!(row.sku_key, "w-1");
        assert_eq!(row.description, "d2");
    }

    // Scenario: A later batch repeats a SKU from an earlier batch of the same upload.
    // Expected Outcome: The later row wins, exactly as sequential upserts would.
    #[traced_test]
    #[tokio::test]
    async fn duplicates_across_batches_keep_file_order() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 2);

        import(
            &orchestrator,
            csv_from_rows(&[
                ("First", "DUP-1", "a"),
                ("Other", "X-1", "b"),
                ("Last", "dup-1", "c"),
            ]),
        )
        .await;

        assert_eq!(store.count().await.unwrap(), 2);
        let row = store.get_by_sku_ci("dup-1").await.unwrap().unwrap();
        assert_eq!(row.name, "Last");
        assert_eq!(row.description, "c");
    }

    // Scenario: Ten batches of ten rows; cancellation is requested right after batch 3 commits.
    // Expected Outcome:
    // - The task ends CANCELLED with 30 rows processed.
    // - Only the rows of batches 1 to 3 are in the store.
    #[traced_test]
    #[tokio::test]
    async fn cancellation_stops_at_the_next_batch_boundary() {
        let token = CancellationToken::new();
        let inner = MemoryProductStore::new();
        let store = Arc::new(CancelAfter::new(inner.clone(), 3, token.clone()));
        let orchestrator = orchestrator(store.clone(), 10);

        let snapshot = orchestrator
            .run(
                TaskId::generate(),
                ImportSource::from_bytes(products_csv(100), "products.csv"),
                token,
            )
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Cancelled);
        assert_eq!(snapshot.processed, 30);
        assert_eq!(snapshot.message, "Import cancelled after 30 records.");
        assert_eq!(store.commits(), 3);
        assert_eq!(inner.count().await.unwrap(), 30);
        assert!(inner.exists_by_sku_ci("SKU-30").await.unwrap());
        assert!(!inner.exists_by_sku_ci("SKU-31").await.unwrap());
    }

    // Scenario: The upload lacks the sku column and has 1000 data rows.
    // Expected Outcome:
    // - The task fails with nothing processed.
    // - Exactly one error is recorded: the structural one, with no row number.
    #[traced_test]
    #[tokio::test]
    async fn missing_sku_header_fails_before_any_batch() {
        let mut csv = String::from("name,description\n");
        for i in 0..1000 {
            csv.push_str(&format!("Product {i},desc\n"));
        }
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        let snapshot = import(&orchestrator, csv).await;

        assert_eq!(snapshot.state, ImportState::Failure);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].row, None);
        assert!(snapshot.errors[0].reason.contains("sku"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    // Scenario: Some rows miss a name or a SKU, or carry a name over the length limit.
    // Expected Outcome:
    // - The task still succeeds and the good rows are stored.
    // - Every bad row is reported with its row number and counted as processed.
    #[traced_test]
    #[tokio::test]
    async fn invalid_rows_are_reported_and_skipped() {
        let long_name = "x".repeat(300);
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        let snapshot = import(
            &orchestrator,
            csv_from_rows(&[
                ("Good", "G-1", "ok"),
                ("", "G-2", "no name"),
                ("No Sku", "", "no sku"),
                (&long_name, "G-4", "too long"),
                ("Also Good", "G-5", "ok"),
            ]),
        )
        .await;

        assert_eq!(snapshot.state, ImportState::Success);
        assert_eq!(snapshot.processed, 5);
        assert_eq!(snapshot.imported, 2);
        assert_eq!(snapshot.error_count, 3);
        assert_eq!(snapshot.message, "Import completed! Processed 2 products.");
        let rows: Vec<_> = snapshot.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![Some(2), Some(3), Some(4)]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    // Scenario: More bad rows than the tracker keeps.
    // Expected Outcome: The list stops at the cap while the count keeps going.
    #[traced_test]
    #[tokio::test]
    async fn error_list_is_capped_but_counted() {
        let mut csv = String::from("name,sku,description\n");
        for i in 0..150 {
            csv.push_str(&format!("Product {i},,missing sku\n"));
        }
        let orchestrator = orchestrator(Arc::new(MemoryProductStore::new()), 50);

        let snapshot = import(&orchestrator, csv).await;

        assert_eq!(snapshot.state, ImportState::Success);
        assert_eq!(snapshot.errors.len(), 100);
        assert_eq!(snapshot.error_count, 150);
        assert_eq!(snapshot.imported, 0);
    }

    // Scenario: Status is asked for an id that was never issued, and for one whose status expired.
    // Expected Outcome: Both are reported as not found, never as PENDING.
    #[traced_test]
    #[tokio::test]
    async fn unknown_and_expired_tasks_are_not_found() {
        let orchestrator =
            forgetful_orchestrator(Arc::new(MemoryProductStore::new()), Duration::from_millis(200));
        assert!(orchestrator.status(&TaskId::generate()).is_none());

        let snapshot = import(&orchestrator, products_csv(5)).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(orchestrator.status(&snapshot.task_id).is_none());
        assert!(orchestrator.tracker().is_empty());
    }

    // Scenario: A CSV file on disk with a reordered, padded header.
    // Expected Outcome: The file is counted up front and imported in full.
    #[traced_test]
    #[tokio::test]
    async fn file_uploads_are_counted_and_imported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_upload(
            dir.path(),
            "catalog.csv",
            " Description ,SKU,Name\nfirst,A-1,Alpha\nsecond,B-2,Beta\n",
        );
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 100);

        let source = ImportSource::from_path(&path).unwrap();
        assert_eq!(source.total, Some(2));
        assert_eq!(source.label, "catalog.csv");

        let snapshot = orchestrator
            .run(TaskId::generate(), source, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Success);
        assert_eq!(snapshot.message, "Import completed! Processed 2 products.");
        let row = store.get_by_sku_ci("b-2").await.unwrap().unwrap();
        assert_eq!(row.name, "Beta");
        assert_eq!(row.description, "second");
    }

    // Scenario: Two uploads run at the same time against one store.
    // Expected Outcome: Both succeed independently and their products do not mix.
    #[traced_test]
    #[tokio::test]
    async fn concurrent_tasks_are_isolated() {
        let store = MemoryProductStore::new();
        let orchestrator = orchestrator(Arc::new(store.clone()), 25);

        let mut left = String::from("name,sku,description\n");
        let mut right = String::from("name,sku,description\n");
        for i in 0..100 {
            left.push_str(&format!("Left {i},L-{i},l\n"));
            right.push_str(&format!("Right {i},R-{i},r\n"));
        }

        let (a, b) = tokio::join!(import(&orchestrator, left), import(&orchestrator, right));

        assert_ne!(a.task_id, b.task_id);
        assert_eq!(a.state, ImportState::Success);
        assert_eq!(b.state, ImportState::Success);
        assert_eq!(a.processed, 100);
        assert_eq!(b.processed, 100);
        assert_eq!(store.count().await.unwrap(), 200);
    }

    // Test Settings: TEST_DATABASE_URL points at a disposable Postgres database.
    // Scenario: A fresh upload followed by a case-changed re-upload.
    // Expected Outcome: Postgres ends with one row per case-folded SKU holding the latest values.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a Postgres instance"]
    async fn postgres_upsert_is_case_insensitive() {
        let store = pg_store().await;
        let orchestrator = orchestrator(Arc::new(store.clone()), 50);

        let first = import(&orchestrator, products_csv(120)).await;
        assert_eq!(first.state, ImportState::Success);
        assert_eq!(store.count().await.unwrap(), 120);

        let second = import(
            &orchestrator,
            csv_from_rows(&[("Widget", "W-1", "d1"), ("Widget2", "w-1", "d2"), ("Moved", "sku-5", "x")]),
        )
        .await;
        assert_eq!(second.state, ImportState::Success);
        assert_eq!(store.count().await.unwrap(), 121);

        let widget = store.get_by_sku_ci("W-1").await.unwrap().unwrap();
        assert_eq!(widget.name, "Widget2");
        assert_eq!(widget.description, "d2");
        assert!(widget.active);

        let moved = store.get_by_sku_ci("SKU-5").await.unwrap().unwrap();
        assert_eq!(moved.name, "Moved");
        assert_eq!(moved.sku_key, "sku-5");

        let dotted = "İ".repeat(100);
        let third = import(&orchestrator, csv_from_rows(&[("Dotted", &dotted, "wide key")])).await;
        assert_eq!(third.state, ImportState::Success);
        assert_eq!(third.imported, 1);
        assert!(store.exists_by_sku_ci(&dotted).await.unwrap());
    }

    // Test Settings: TEST_DATABASE_URL points at a disposable Postgres database.
    // Scenario: Cancellation after the third of ten batches.
    // Expected Outcome: Exactly the committed batches are visible in Postgres.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a Postgres instance"]
    async fn postgres_keeps_only_committed_batches_on_cancel() {
        let token = CancellationToken::new();
        let inner = pg_store().await;
        let store = Arc::new(CancelAfter::new(inner.clone(), 3, token.clone()));
        let orchestrator = orchestrator(store, 10);

        let snapshot = orchestrator
            .run(
                TaskId::generate(),
                ImportSource::from_bytes(products_csv(100), "products.csv"),
                token,
            )
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Cancelled);
        assert_eq!(snapshot.processed, 30);
        assert_eq!(inner.count().await.unwrap(), 30);
    }
}

//! Per-table and whole-database orchestration

use wp_mysqldump::dumper::{DumpEngine, DumpOptions, DumpSummary, TableOutcome, TablePolicy};

use crate::common::{MockConnector, MockError, broken, insert_tuple_counts, is_mock_error, numbered_rows, row};

const DDL_T: &str = "CREATE TABLE `t` (`id` int NOT NULL, `name` varchar(32))";

/// Statements the engine issues to dump the data of `t(id, name)`.
fn full_table(db: MockConnector, table: &str, rows: usize) -> MockConnector {
    let ddl = format!("CREATE TABLE `{table}` (`id` int NOT NULL, `name` varchar(32))");
    let db = db
        .expect_create_table(table, &ddl)
        .expect_count(&format!("SELECT COUNT(*) FROM `{table}`"), rows as u64);
    if rows == 0 {
        return db;
    }
    db.expect_query(
        &format!("SELECT * FROM `{table}` LIMIT 1"),
        &["id", "name"],
        vec![],
    )
    .expect_query(
        &format!("SELECT `id`, `name` FROM `{table}`"),
        &["id", "name"],
        numbered_rows(rows),
    )
}

#[tokio::test]
async fn ignored_table_writes_nothing() -> anyhow::Result<()> {
    let mut db = MockConnector::new();
    let opts = DumpOptions::new()
        .with_policy("T", TablePolicy::Ignore)
        .with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::Skipped);
    assert!(out.is_empty());
    assert!(db.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn nodata_table_dumps_structure_only() -> anyhow::Result<()> {
    let mut db = MockConnector::new().expect_create_table("t", DDL_T);
    let opts = DumpOptions::new()
        .with_policy("t", TablePolicy::NoData)
        .with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::StructureOnly);
    let script = String::from_utf8(out)?;
    assert!(script.contains("DROP TABLE IF EXISTS `t`;\n"));
    assert!(script.contains(&format!("{DDL_T};\n")));
    assert!(!script.contains("-- Data for table"));
    assert!(!script.contains("LOCK TABLES"));
    assert!(!script.contains("INSERT INTO"));
    // no session lock for structure-only tables
    assert_eq!(db.executed(), &["SHOW CREATE TABLE `t`".to_string()]);
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn empty_table_has_no_data_section() -> anyhow::Result<()> {
    let mut db = full_table(MockConnector::new(), "t", 0);
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::Dumped { rows: 0 });
    let script = String::from_utf8(out)?;
    assert!(script.contains("DROP TABLE IF EXISTS `t`;"));
    assert!(script.contains(&format!("{DDL_T};")));
    assert!(script.contains("-- Data for table `t` -- 0 rows"));
    assert!(!script.contains("LOCK TABLES `t` WRITE;"));
    assert!(!script.contains("UNLOCK TABLES;"));
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn full_table_script_layout() -> anyhow::Result<()> {
    let mut db = full_table(MockConnector::new(), "t", 2);
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    let expected = format!(
        "\n--\n-- Structure for table `t`\n--\n\n\
         DROP TABLE IF EXISTS `t`;\n\
         {DDL_T};\n\
         \n--\n-- Data for table `t` -- 2 rows\n--\n\n\
         LOCK TABLES `t` WRITE;\n\
         INSERT INTO `t` VALUES\n\
         ( '1', 'name-1' ),\n\
         ( '2', 'name-2' );\n\
         \n\
         UNLOCK TABLES;\n"
    );
    assert_eq!(String::from_utf8(out)?, expected);
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn hundred_fifty_rows_make_two_inserts() -> anyhow::Result<()> {
    let mut db = full_table(MockConnector::new(), "t", 150);
    let opts = DumpOptions::new().with_extended_insert_rows(100);
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::Dumped { rows: 150 });
    let script = String::from_utf8(out)?;
    assert_eq!(insert_tuple_counts(&script, "t"), vec![100, 50]);
    Ok(())
}

#[tokio::test]
async fn where_clause_reaches_count_and_select() -> anyhow::Result<()> {
    let mut db = MockConnector::new()
        .expect_create_table("t", DDL_T)
        .expect_count("SELECT COUNT(*) FROM `t` WHERE x > 0", 1)
        .expect_query("SELECT * FROM `t` LIMIT 1", &["x"], vec![])
        .expect_query("SELECT `x` FROM `t` WHERE x > 0", &["x"], vec![row(&[Some("5")])]);
    let opts = DumpOptions::new().with_where("t", "x > 0");
    let mut out: Vec<u8> = Vec::new();
    DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    let filtered: Vec<&String> = db
        .executed()
        .iter()
        .filter(|sql| sql.starts_with("SELECT COUNT") || sql.starts_with("SELECT `"))
        .collect();
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|sql| sql.ends_with(" WHERE x > 0")));
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn table_lock_wraps_the_read() -> anyhow::Result<()> {
    let db = MockConnector::new()
        .expect_exec("LOCK TABLES `t` READ", 0)
        .expect_exec("FLUSH TABLES `t`", 0);
    let mut db = full_table(db, "t", 1).expect_exec("UNLOCK TABLES", 0);
    let opts = DumpOptions::new().with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(
        db.executed(),
        &[
            "LOCK TABLES `t` READ",
            "FLUSH TABLES `t`",
            "SHOW CREATE TABLE `t`",
            "SELECT COUNT(*) FROM `t`",
            "SELECT * FROM `t` LIMIT 1",
            "SELECT `id`, `name` FROM `t`",
            "UNLOCK TABLES",
        ]
    );
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn lock_released_for_empty_table() -> anyhow::Result<()> {
    let db = MockConnector::new()
        .expect_exec("LOCK TABLES `t` READ", 0)
        .expect_exec("FLUSH TABLES `t`", 0);
    let mut db = full_table(db, "t", 0).expect_exec("UNLOCK TABLES", 0);
    let opts = DumpOptions::new().with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert!(!String::from_utf8(out)?.contains("UNLOCK TABLES;"));
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn lock_failures_are_tolerated_by_default() -> anyhow::Result<()> {
    let db = MockConnector::new()
        .expect_error("LOCK TABLES `t` READ", MockError("denied".into()))
        .expect_error("FLUSH TABLES `t`", MockError("denied".into()));
    let mut db = full_table(db, "t", 3).expect_error("UNLOCK TABLES", broken());
    let opts = DumpOptions::new().with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::Dumped { rows: 3 });
    assert_eq!(insert_tuple_counts(&String::from_utf8(out)?, "t"), vec![3]);
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn strict_locks_abort_on_lock_failure() {
    let mut db = MockConnector::new()
        .expect_error("LOCK TABLES `t` READ", MockError("denied".into()))
        .expect_exec("UNLOCK TABLES", 0);
    let opts = DumpOptions::new()
        .with_table_lock(true)
        .with_strict_locks(true);
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &MockError("denied".into())));
    assert!(out.is_empty());
    db.assert_done();
}

#[tokio::test]
async fn strict_locks_surface_unlock_failure() {
    let db = MockConnector::new()
        .expect_exec("LOCK TABLES `t` READ", 0)
        .expect_exec("FLUSH TABLES `t`", 0);
    let mut db = full_table(db, "t", 1).expect_error("UNLOCK TABLES", broken());
    let opts = DumpOptions::new()
        .with_table_lock(true)
        .with_strict_locks(true);
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &broken()));
    db.assert_done();
}

#[tokio::test]
async fn strict_locks_ignore_cleanup_unlock_failure_on_empty_table() -> anyhow::Result<()> {
    let db = MockConnector::new()
        .expect_exec("LOCK TABLES `t` READ", 0)
        .expect_exec("FLUSH TABLES `t`", 0);
    let mut db = full_table(db, "t", 0).expect_error("UNLOCK TABLES", broken());
    let opts = DumpOptions::new()
        .with_table_lock(true)
        .with_strict_locks(true);
    let mut out: Vec<u8> = Vec::new();
    let outcome = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await?;
    assert_eq!(outcome, TableOutcome::Dumped { rows: 0 });
    assert!(!String::from_utf8(out)?.contains("LOCK TABLES"));
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn structure_failure_propagates_and_still_unlocks() {
    let mut db = MockConnector::new()
        .expect_exec("LOCK TABLES `t` READ", 0)
        .expect_exec("FLUSH TABLES `t`", 0)
        .expect_error("SHOW CREATE TABLE `t`", broken())
        .expect_exec("UNLOCK TABLES", 0);
    let opts = DumpOptions::new().with_table_lock(true);
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &broken()));
    assert!(out.is_empty());
    db.assert_done();
}

#[tokio::test]
async fn count_failure_aborts_table() {
    let mut db = MockConnector::new()
        .expect_create_table("t", DDL_T)
        .expect_error("SELECT COUNT(*) FROM `t`", broken());
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_table(&mut out, "t")
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &broken()));
    let script = String::from_utf8(out).unwrap();
    assert!(script.contains("DROP TABLE IF EXISTS `t`;"));
    assert!(!script.contains("-- Data for table"));
}

#[tokio::test]
async fn write_tables_follows_enumeration_and_policies() -> anyhow::Result<()> {
    let db = MockConnector::new().expect_query(
        "SHOW FULL TABLES",
        &["Tables_in_shop", "Table_type"],
        vec![
            row(&[Some("users"), Some("BASE TABLE")]),
            row(&[Some("sessions"), Some("BASE TABLE")]),
            row(&[Some("user_view"), Some("VIEW")]),
            row(&[Some("audit"), Some("BASE TABLE")]),
        ],
    );
    let db = full_table(db, "users", 2);
    let mut db = db.expect_create_table("audit", "CREATE TABLE `audit` (`id` int)");
    let opts = DumpOptions::new()
        .with_policy("Sessions", TablePolicy::Ignore)
        .with_policy("AUDIT", TablePolicy::NoData);
    let mut out: Vec<u8> = Vec::new();
    let summary = DumpEngine::new(&mut db, &opts).write_tables(&mut out).await?;
    assert_eq!(
        summary,
        DumpSummary {
            tables: 2,
            skipped: 1,
            rows: 2
        }
    );
    let script = String::from_utf8(out)?;
    let users = script.find("-- Structure for table `users`").unwrap();
    let audit = script.find("-- Structure for table `audit`").unwrap();
    assert!(users < audit);
    assert!(!script.contains("sessions"));
    assert!(!script.contains("user_view"));
    db.assert_done();
    Ok(())
}

#[tokio::test]
async fn write_tables_returns_enumeration_error_untouched() {
    let mut db = MockConnector::new().expect_error("SHOW FULL TABLES", broken());
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_tables(&mut out)
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &broken()));
    assert_eq!(err.to_string(), "broken");
    assert!(out.is_empty());
}

#[tokio::test]
async fn write_tables_stops_at_first_failing_table() {
    let db = MockConnector::new().expect_query(
        "SHOW FULL TABLES",
        &["Tables_in_shop", "Table_type"],
        vec![
            row(&[Some("a"), Some("BASE TABLE")]),
            row(&[Some("b"), Some("BASE TABLE")]),
            row(&[Some("c"), Some("BASE TABLE")]),
        ],
    );
    let mut db = full_table(db, "a", 1).expect_error("SHOW CREATE TABLE `b`", broken());
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    let err = DumpEngine::new(&mut db, &opts)
        .write_tables(&mut out)
        .await
        .unwrap_err();
    assert!(is_mock_error(&err, &broken()));
    let script = String::from_utf8(out).unwrap();
    assert!(script.contains("INSERT INTO `a` VALUES"));
    assert!(!script.contains("`b`"));
    assert!(!db.executed().iter().any(|sql| sql.contains("`c`")));
    db.assert_done();
}

#[tokio::test]
async fn write_selected_tables_uses_given_order() -> anyhow::Result<()> {
    let db = full_table(MockConnector::new(), "b", 1);
    let mut db = full_table(db, "a", 0);
    let opts = DumpOptions::new();
    let mut out: Vec<u8> = Vec::new();
    let summary = DumpEngine::new(&mut db, &opts)
        .write_selected_tables(&mut out, &["b", "a"])
        .await?;
    assert_eq!(summary.tables, 2);
    assert_eq!(summary.rows, 1);
    db.assert_done();
    Ok(())
}

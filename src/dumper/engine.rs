use log::{debug, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::connector::{Cell, DatabaseConnector};
use super::escape::{quote_identifier, render_tuple};
use super::options::{DumpOptions, TablePolicy};
use super::script;

/// What `write_table` did with a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    Skipped,
    StructureOnly,
    Dumped { rows: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables: usize,
    pub skipped: usize,
    pub rows: u64,
}

impl DumpSummary {
    fn record(&mut self, outcome: TableOutcome) {
        match outcome {
            TableOutcome::Skipped => self.skipped += 1,
            TableOutcome::StructureOnly => self.tables += 1,
            TableOutcome::Dumped { rows } => {
                self.tables += 1;
                self.rows += rows;
            }
        }
    }
}

/// Generates the dump script for one database over a borrowed connection.
///
/// The connection stays owned by the caller and is never closed here. All
/// work is sequential: tables in enumeration order, rows in cursor order.
pub struct DumpEngine<'a, C: DatabaseConnector + ?Sized> {
    conn: &'a mut C,
    opts: &'a DumpOptions,
}

impl<'a, C: DatabaseConnector + ?Sized> DumpEngine<'a, C> {
    pub fn new(conn: &'a mut C, opts: &'a DumpOptions) -> Self {
        Self { conn, opts }
    }

    async fn exec(&mut self, sql: &str) -> anyhow::Result<u64> {
        debug!("exec: {}", sql);
        self.conn.execute(sql).await
    }

    async fn query_one(&mut self, sql: &str) -> anyhow::Result<Vec<Cell>> {
        debug!("query: {}", sql);
        let mut cursor = self.conn.query(sql).await?;
        let row = cursor.next_row().await?;
        row.ok_or_else(|| anyhow::anyhow!("query returned no rows: {}", sql))
    }

    /// `LOCK TABLES `t` READ` for the current session.
    pub async fn lock_table_reading(&mut self, table: &str) -> anyhow::Result<u64> {
        self.exec(&format!("LOCK TABLES {} READ", quote_identifier(table)))
            .await
    }

    /// `FLUSH TABLES `t``: closes the table so the read sees a settled state.
    pub async fn flush_table(&mut self, table: &str) -> anyhow::Result<u64> {
        self.exec(&format!("FLUSH TABLES {}", quote_identifier(table)))
            .await
    }

    pub async fn unlock_tables(&mut self) -> anyhow::Result<u64> {
        self.exec("UNLOCK TABLES").await
    }

    /// Base tables (views excluded) in the server's enumeration order.
    ///
    /// On any failure the error is returned and no partial list escapes.
    pub async fn list_tables(&mut self) -> anyhow::Result<Vec<String>> {
        let sql = "SHOW FULL TABLES";
        debug!("query: {}", sql);
        let mut cursor = self.conn.query(sql).await?;
        let mut tables = Vec::new();
        while let Some(row) = cursor.next_row().await? {
            let [name, kind, ..] = row.as_slice() else {
                anyhow::bail!("SHOW FULL TABLES returned {} columns, expected 2", row.len());
            };
            let name = name.as_text()?;
            if kind.as_text()?.eq_ignore_ascii_case("BASE TABLE") {
                tables.push(name.to_string());
            }
        }
        Ok(tables)
    }

    /// DDL from `SHOW CREATE TABLE`.
    pub async fn fetch_create_table(&mut self, table: &str) -> anyhow::Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let row = self.query_one(&sql).await?;
        let [_name, ddl, ..] = row.as_slice() else {
            anyhow::bail!("SHOW CREATE TABLE returned {} columns, expected 2", row.len());
        };
        Ok(ddl.as_text()?.to_string())
    }

    /// Structure section: header comment, `DROP TABLE IF EXISTS` and the DDL.
    pub async fn write_create_table<W>(&mut self, w: &mut W, table: &str) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let ddl = self.fetch_create_table(table).await?;
        let mut text = script::structure_header(table);
        text.push_str(&script::drop_table(table));
        text.push_str(&ddl);
        text.push_str(";\n");
        w.write_all(text.as_bytes()).await?;
        Ok(())
    }

    /// Select-list entries in native column order, substitutions applied.
    pub async fn columns_for_select(&mut self, table: &str) -> anyhow::Result<Vec<String>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_identifier(table));
        debug!("query: {}", sql);
        let columns = {
            let cursor = self.conn.query(&sql).await?;
            cursor.columns().to_vec()
        };
        let opts = self.opts;
        Ok(columns
            .iter()
            .map(|column| match opts.select_expr(table, column) {
                Some(expr) => format!("{} AS {}", expr, quote_identifier(column)),
                None => quote_identifier(column),
            })
            .collect())
    }

    fn append_where(&self, table: &str, mut query: String) -> String {
        if let Some(expr) = self.opts.where_clause(table) {
            query.push_str(" WHERE ");
            query.push_str(expr);
        }
        query
    }

    pub async fn select_query_for_table(&mut self, table: &str) -> anyhow::Result<String> {
        let columns = self.columns_for_select(table).await?;
        let query = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(table)
        );
        Ok(self.append_where(table, query))
    }

    /// Rows matching the table's `WHERE` entry, or all rows without one.
    pub async fn row_count_for_table(&mut self, table: &str) -> anyhow::Result<u64> {
        let sql = self.append_where(
            table,
            format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
        );
        let row = self.query_one(&sql).await?;
        let cell = row
            .first()
            .ok_or_else(|| anyhow::anyhow!("COUNT(*) returned no columns"))?;
        let text = cell.as_text()?;
        text.trim()
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("invalid row count '{}': {}", text, e))
    }

    /// Data header comment carrying the row count; returns that count.
    pub async fn write_table_header<W>(&mut self, w: &mut W, table: &str) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let count = self.row_count_for_table(table).await?;
        w.write_all(script::data_header(table, count).as_bytes())
            .await?;
        Ok(count)
    }

    /// Streams the table's rows as batched `INSERT` statements; returns rows written.
    ///
    /// Statements flushed before a failure stay in the sink.
    pub async fn write_table_data<W>(&mut self, w: &mut W, table: &str) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let query = self.select_query_for_table(table).await?;
        let prefix = script::insert_prefix(table);
        let batch_rows = self.opts.extended_insert_rows();

        debug!("query: {}", query);
        let mut cursor = self.conn.query(&query).await?;
        let width = cursor.columns().len();
        let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_rows.min(1024));
        let mut total = 0u64;
        while let Some(row) = cursor.next_row().await? {
            if row.len() != width {
                anyhow::bail!(
                    "row {} of `{}` has {} values, expected {}",
                    total + 1,
                    table,
                    row.len(),
                    width
                );
            }
            batch.push(render_tuple(&row));
            total += 1;
            if batch_rows != 0 && batch.len() >= batch_rows {
                debug!("flush {} rows of `{}`", batch.len(), table);
                script::write_insert(w, &prefix, &mut batch).await?;
            }
        }
        if !batch.is_empty() {
            debug!("flush {} rows of `{}`", batch.len(), table);
            script::write_insert(w, &prefix, &mut batch).await?;
        }
        Ok(total)
    }

    fn tolerate(&self, action: &str, table: &str, res: anyhow::Result<u64>) -> anyhow::Result<()> {
        match res {
            Ok(_) => Ok(()),
            Err(e) if self.opts.strict_locks() => Err(e),
            Err(e) => {
                warn!("{} `{}` failed, continuing: {}", action, table, e);
                Ok(())
            }
        }
    }

    async fn acquire_read_lock(&mut self, table: &str) -> anyhow::Result<()> {
        let locked = self.lock_table_reading(table).await;
        self.tolerate("LOCK TABLES", table, locked)?;
        let flushed = self.flush_table(table).await;
        self.tolerate("FLUSH TABLES", table, flushed)
    }

    async fn write_sections<W>(
        &mut self,
        w: &mut W,
        table: &str,
        with_data: bool,
    ) -> anyhow::Result<TableOutcome>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.write_create_table(w, table).await?;
        if !with_data {
            return Ok(TableOutcome::StructureOnly);
        }

        let count = self.write_table_header(w, table).await?;
        if count == 0 {
            return Ok(TableOutcome::Dumped { rows: 0 });
        }

        script::write_lock_write_marker(w, table).await?;
        let rows = self.write_table_data(w, table).await?;
        w.write_all(b"\n").await?;
        script::write_unlock_marker(w).await?;
        Ok(TableOutcome::Dumped { rows })
    }

    /// Dumps one table according to its policy.
    pub async fn write_table<W>(&mut self, w: &mut W, table: &str) -> anyhow::Result<TableOutcome>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let policy = self.opts.policy(table);
        if policy == TablePolicy::Ignore {
            info!("skip table `{}`", table);
            return Ok(TableOutcome::Skipped);
        }

        let with_data = policy != TablePolicy::NoData;
        let locked = with_data && self.opts.use_table_lock();
        let result = if locked {
            match self.acquire_read_lock(table).await {
                Ok(()) => self.write_sections(w, table, with_data).await,
                Err(e) => Err(e),
            }
        } else {
            self.write_sections(w, table, with_data).await
        };

        // the session lock is released on every path once taken; only the
        // unlock closing a written data section is subject to strict_locks
        if locked {
            let unlocked = self.unlock_tables().await;
            let closes_data = matches!(result, Ok(TableOutcome::Dumped { rows }) if rows > 0);
            if closes_data {
                self.tolerate("UNLOCK TABLES", table, unlocked)?;
            } else if let Err(e) = unlocked {
                warn!("UNLOCK TABLES after `{}` failed: {}", table, e);
            }
        }

        let outcome = result?;
        match outcome {
            TableOutcome::Dumped { rows } => info!("dumped table `{}`: {} rows", table, rows),
            _ => info!("dumped table `{}` ({})", table, policy),
        }
        Ok(outcome)
    }

    /// Dumps the named tables in order, stopping at the first failure.
    pub async fn write_selected_tables<W, S>(
        &mut self,
        w: &mut W,
        tables: &[S],
    ) -> anyhow::Result<DumpSummary>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
        S: AsRef<str>,
    {
        let mut summary = DumpSummary::default();
        for table in tables {
            let outcome = self.write_table(w, table.as_ref()).await?;
            summary.record(outcome);
        }
        Ok(summary)
    }

    /// Dumps every base table of the database.
    pub async fn write_tables<W>(&mut self, w: &mut W) -> anyhow::Result<DumpSummary>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let tables = self.list_tables().await?;
        info!("{} base tables to dump", tables.len());
        self.write_selected_tables(w, &tables).await
    }
}

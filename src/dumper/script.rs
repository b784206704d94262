//! Fixed text fragments of the generated script.

use chrono::{DateTime, TimeZone};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::escape::quote_identifier;

pub fn structure_header(table: &str) -> String {
    format!(
        "\n--\n-- Structure for table {}\n--\n\n",
        quote_identifier(table)
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};\n", quote_identifier(table))
}

pub fn data_header(table: &str, rows: u64) -> String {
    format!(
        "\n--\n-- Data for table {} -- {} rows\n--\n\n",
        quote_identifier(table),
        rows
    )
}

pub fn insert_prefix(table: &str) -> String {
    format!("INSERT INTO {} VALUES\n", quote_identifier(table))
}

pub async fn write_lock_write_marker<W>(w: &mut W, table: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let line = format!("LOCK TABLES {} WRITE;\n", quote_identifier(table));
    w.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn write_unlock_marker<W>(w: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    w.write_all(b"UNLOCK TABLES;\n").await?;
    Ok(())
}

/// Writes one multi-row `INSERT` and clears `batch`. Empty batches write nothing.
pub async fn write_insert<W>(
    w: &mut W,
    prefix: &str,
    batch: &mut Vec<Vec<u8>>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }
    let body: usize = batch.iter().map(|t| t.len() + 2).sum();
    let mut stmt = Vec::with_capacity(prefix.len() + body + 2);
    stmt.extend_from_slice(prefix.as_bytes());
    for (idx, tuple) in batch.iter().enumerate() {
        if idx > 0 {
            stmt.extend_from_slice(b",\n");
        }
        stmt.extend_from_slice(tuple);
    }
    stmt.extend_from_slice(b";\n");
    w.write_all(&stmt).await?;
    batch.clear();
    Ok(())
}

pub async fn write_preamble<W, Tz>(
    w: &mut W,
    database: &str,
    started: &DateTime<Tz>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let text = format!(
        "-- {} {}\n--\n-- Database: {}\n-- Started: {}\n-- ------------------------------------------------------\n\nSET NAMES utf8mb4;\nSET FOREIGN_KEY_CHECKS = 0;\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        quote_identifier(database),
        started.format("%Y-%m-%d %H:%M:%S %z"),
    );
    w.write_all(text.as_bytes()).await?;
    Ok(())
}

pub async fn write_footer<W, Tz>(w: &mut W, finished: &DateTime<Tz>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let text = format!(
        "\nSET FOREIGN_KEY_CHECKS = 1;\n\n-- Dump completed: {}\n",
        finished.format("%Y-%m-%d %H:%M:%S %z"),
    );
    w.write_all(text.as_bytes()).await?;
    Ok(())
}

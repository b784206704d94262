use async_trait::async_trait;
use bytes::Bytes;

/// One scanned cell. Every column type collapses to its raw bytes or NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Bytes(Bytes),
}

impl Cell {
    /// Decodes a non-null UTF-8 cell; used for metadata rows (table names, DDL, counts).
    pub fn as_text(&self) -> anyhow::Result<&str> {
        match self {
            Cell::Null => anyhow::bail!("unexpected NULL value"),
            Cell::Bytes(raw) => std::str::from_utf8(raw)
                .map_err(|e| anyhow::anyhow!("value is not valid utf-8: {}", e)),
        }
    }
}

impl From<Option<Vec<u8>>> for Cell {
    fn from(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(raw) => Cell::Bytes(Bytes::from(raw)),
            None => Cell::Null,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// Open result set. Dropping it releases the server-side cursor.
#[async_trait]
pub trait RowCursor: Send {
    /// Column names in the result's native order.
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the result set is exhausted.
    async fn next_row(&mut self) -> anyhow::Result<Option<Vec<Cell>>>;
}

/// Anything able to run plain SQL text without bound parameters.
#[async_trait]
pub trait DatabaseConnector: Send {
    /// Runs a statement that returns no rows and reports rows affected.
    async fn execute(&mut self, sql: &str) -> anyhow::Result<u64>;

    /// Runs a statement and hands back a cursor over its rows.
    async fn query<'a>(&'a mut self, sql: &'a str) -> anyhow::Result<Box<dyn RowCursor + 'a>>;
}

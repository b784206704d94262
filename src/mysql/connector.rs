use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;
use log::info;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, raw_sql};

use crate::dumper::{Cell, DatabaseConnector, RowCursor};
use crate::mysql::config::MysqlConf;

/// Single MySQL session. `LOCK TABLES` is per session, so a pool is not
/// usable here.
pub struct MySqlConnector {
    conn: MySqlConnection,
    database: String,
}

impl MySqlConnector {
    pub async fn connect(conf: &MysqlConf) -> anyhow::Result<Self> {
        let opts = conf.connect_options()?;
        let conn = opts.connect().await?;
        let mut connector = Self::from_connection(conn);
        connector.database = connector.current_database().await?;
        info!("connected to mysql database `{}`", connector.database);
        Ok(connector)
    }

    pub fn from_connection(conn: MySqlConnection) -> Self {
        Self {
            conn,
            database: String::new(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    async fn current_database(&mut self) -> anyhow::Result<String> {
        let row = raw_sql("SELECT DATABASE()").fetch_one(&mut self.conn).await?;
        let name: Option<Vec<u8>> = row.try_get_unchecked(0)?;
        let name = name.ok_or_else(|| anyhow::anyhow!("no database selected"))?;
        Ok(String::from_utf8(name)?)
    }

    pub async fn close(self) -> anyhow::Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<u64> {
        let done = (&mut self.conn).execute(raw_sql(sql)).await?;
        Ok(done.rows_affected())
    }

    async fn query<'a>(&'a mut self, sql: &'a str) -> anyhow::Result<Box<dyn RowCursor + 'a>> {
        // 列名取自预编译结果，空结果集也能拿到
        let columns = {
            let stmt = (&mut self.conn).prepare(sql).await?;
            stmt.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        };
        // 文本协议：每个单元格都是服务端给出的原始字节
        let rows = raw_sql(sql).fetch(&mut self.conn);
        Ok(Box::new(MySqlCursor { columns, rows }))
    }
}

struct MySqlCursor<'a> {
    columns: Vec<String>,
    rows: BoxStream<'a, Result<MySqlRow, sqlx::Error>>,
}

#[async_trait]
impl<'a> RowCursor for MySqlCursor<'a> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> anyhow::Result<Option<Vec<Cell>>> {
        let Some(row) = self.rows.try_next().await? else {
            return Ok(None);
        };
        let mut cells = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            let raw: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
            cells.push(Cell::from(raw));
        }
        Ok(Some(cells))
    }
}

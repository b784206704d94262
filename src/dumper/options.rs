use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EXTENDED_INSERT_ROWS: usize = 100;

/// What to do with a table during a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TablePolicy {
    /// Structure and data.
    #[default]
    Full,
    /// Structure only.
    NoData,
    /// Skipped entirely.
    Ignore,
}

impl FromStr for TablePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(TablePolicy::Ignore),
            "nodata" => Ok(TablePolicy::NoData),
            "full" | "" => Ok(TablePolicy::Full),
            other => anyhow::bail!("invalid table filter '{}'; allowed: ignore,nodata", other),
        }
    }
}

impl fmt::Display for TablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TablePolicy::Full => "full",
            TablePolicy::NoData => "nodata",
            TablePolicy::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

/// Per-dump settings. Table and column keys are lower-cased on insert so every
/// lookup is a plain map hit.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    select: HashMap<String, HashMap<String, String>>,
    wheres: HashMap<String, String>,
    filter: HashMap<String, TablePolicy>,
    use_table_lock: bool,
    strict_locks: bool,
    extended_insert_rows: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            select: HashMap::new(),
            wheres: HashMap::new(),
            filter: HashMap::new(),
            use_table_lock: false,
            strict_locks: false,
            extended_insert_rows: DEFAULT_EXTENDED_INSERT_ROWS,
        }
    }
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `column` of `table` with `expr` in the data `SELECT`.
    pub fn with_select(
        mut self,
        table: impl AsRef<str>,
        column: impl AsRef<str>,
        expr: impl Into<String>,
    ) -> Self {
        self.select
            .entry(normalize(table.as_ref()))
            .or_default()
            .insert(normalize(column.as_ref()), expr.into());
        self
    }

    /// Restricts the rows of `table` to those matching `expr`.
    pub fn with_where(mut self, table: impl AsRef<str>, expr: impl Into<String>) -> Self {
        self.wheres.insert(normalize(table.as_ref()), expr.into());
        self
    }

    pub fn with_policy(mut self, table: impl AsRef<str>, policy: TablePolicy) -> Self {
        if policy == TablePolicy::Full {
            self.filter.remove(&normalize(table.as_ref()));
        } else {
            self.filter.insert(normalize(table.as_ref()), policy);
        }
        self
    }

    pub fn with_table_lock(mut self, enabled: bool) -> Self {
        self.use_table_lock = enabled;
        self
    }

    /// When set, failures of `LOCK`/`FLUSH`/`UNLOCK TABLES` abort the table
    /// instead of being logged and ignored.
    pub fn with_strict_locks(mut self, enabled: bool) -> Self {
        self.strict_locks = enabled;
        self
    }

    /// Rows per `INSERT` statement; `0` puts every row of a table in one statement.
    pub fn with_extended_insert_rows(mut self, rows: usize) -> Self {
        self.extended_insert_rows = rows;
        self
    }

    pub fn select_expr(&self, table: &str, column: &str) -> Option<&str> {
        self.select
            .get(&normalize(table))
            .and_then(|cols| cols.get(&normalize(column)))
            .map(String::as_str)
    }

    pub fn where_clause(&self, table: &str) -> Option<&str> {
        self.wheres.get(&normalize(table)).map(String::as_str)
    }

    pub fn policy(&self, table: &str) -> TablePolicy {
        self.filter
            .get(&normalize(table))
            .copied()
            .unwrap_or_default()
    }

    pub fn use_table_lock(&self) -> bool {
        self.use_table_lock
    }

    pub fn strict_locks(&self) -> bool {
        self.strict_locks
    }

    pub fn extended_insert_rows(&self) -> usize {
        self.extended_insert_rows
    }
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::dumper::options::{DumpOptions, TablePolicy};
use crate::mysql::MysqlConf;

/// `[dump]` 段：输出与锁表相关的开关。
#[derive(Educe, Deserialize, Serialize, PartialEq, Clone)]
#[educe(Debug, Default)]
#[serde(default)]
pub struct DumpSection {
    /// 输出文件；为空或 `-` 时写到 stdout
    pub output: Option<String>,
    pub use_table_lock: bool,
    pub strict_locks: bool,
    /// gzip 压缩输出；输出路径以 `.gz` 结尾时自动开启
    pub compress: bool,
    /// 每条 INSERT 合并的行数，0 表示整表一条
    #[educe(Default = 100)]
    pub extended_insert_rows: usize,
    /// 是否输出脚本头尾（SET NAMES 等）
    #[educe(Default = true)]
    pub header: bool,
}

/// 完整的 TOML 配置文件。
///
/// ```toml
/// [mysql]
/// endpoint = "localhost:3306"
/// username = "root"
/// database = "shop"
///
/// [dump]
/// extended_insert_rows = 500
///
/// [select.users]
/// email = "CONCAT(id, '@example.com')"
///
/// [where]
/// orders = "created_at > '2024-01-01'"
///
/// [filter]
/// sessions = "ignore"
/// audit_log = "nodata"
/// ```
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DumpConf {
    pub mysql: MysqlConf,
    pub dump: DumpSection,
    pub select: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(rename = "where")]
    pub wheres: BTreeMap<String, String>,
    pub filter: BTreeMap<String, String>,
}

impl DumpConf {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let conf: DumpConf = toml::from_str(text).context("parse dump config")?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("load config {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (table, policy) in &self.filter {
            policy
                .parse::<TablePolicy>()
                .with_context(|| format!("filter.{table}"))?;
        }
        for (table, expr) in &self.wheres {
            if expr.trim().is_empty() {
                anyhow::bail!("where.{table} must not be empty");
            }
        }
        for (table, cols) in &self.select {
            for (col, expr) in cols {
                if expr.trim().is_empty() {
                    anyhow::bail!("select.{table}.{col} must not be empty");
                }
            }
        }
        Ok(())
    }

    /// 构建引擎使用的只读选项，表名/列名在这里统一转成小写。
    pub fn to_options(&self) -> anyhow::Result<DumpOptions> {
        let mut opts = DumpOptions::new()
            .with_table_lock(self.dump.use_table_lock)
            .with_strict_locks(self.dump.strict_locks)
            .with_extended_insert_rows(self.dump.extended_insert_rows);
        for (table, cols) in &self.select {
            for (col, expr) in cols {
                opts = opts.with_select(table, col, expr.clone());
            }
        }
        for (table, expr) in &self.wheres {
            opts = opts.with_where(table, expr.clone());
        }
        for (table, policy) in &self.filter {
            let policy = policy
                .parse::<TablePolicy>()
                .with_context(|| format!("filter.{table}"))?;
            opts = opts.with_policy(table, policy);
        }
        Ok(opts)
    }

    /// `None` 表示写 stdout。
    pub fn output_path(&self) -> Option<&str> {
        self.dump
            .output
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "-")
    }
}

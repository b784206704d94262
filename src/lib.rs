//! wp-mysqldump: export a MySQL database's schema and data as a SQL script,
//! with per-table column substitution, row filters and table policies.
//!
//! 模块划分：
//! - dumper：与具体数据库无关的导出引擎
//! - mysql：基于 sqlx 的 MySQL 连接实现

pub mod dumper;
pub mod mysql;

pub use dumper::{
    DatabaseConnector, DumpConf, DumpEngine, DumpOptions, DumpSummary, TableOutcome, TablePolicy,
};
pub use mysql::{MySqlConnector, MysqlConf};

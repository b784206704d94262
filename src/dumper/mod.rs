//! Dump engine: table enumeration, per-table policy, SELECT generation with
//! column substitutions and row filters, and batched INSERT output.
//!
//! 模块划分：
//! - connector：数据库连接抽象（DatabaseConnector / RowCursor / Cell）
//! - options：引擎只读选项（select/where/filter 映射与锁表开关）
//! - config：TOML 配置文件
//! - escape：字符串字面量转义与标识符引用
//! - script：脚本中的固定文本片段
//! - output：输出目标（文件 / gzip / stdout）
//! - engine：DumpEngine 编排

mod config;
mod connector;
mod engine;
mod escape;
mod options;
pub mod output;
pub mod script;

pub use config::{DumpConf, DumpSection};
pub use connector::{Cell, DatabaseConnector, RowCursor};
pub use engine::{DumpEngine, DumpSummary, TableOutcome};
pub use escape::{escape, quote_identifier, render_cell, render_tuple};
pub use options::{DEFAULT_EXTENDED_INSERT_ROWS, DumpOptions, TablePolicy};

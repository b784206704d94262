//! MySQL 连接层：连接串配置与基于 sqlx 的 DatabaseConnector 实现。
//!
//! 模块划分：
//! - config：MysqlConf（连接串解析、环境变量覆盖）
//! - connector：MySqlConnector（单连接，文本协议读取原始字节）

mod config;
mod connector;

pub use config::{MysqlConf, redact};
pub use connector::MySqlConnector;

//! wp-mysqldump - export a MySQL database as a SQL script
//!
//! Entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use log::{error, info};
use tokio::io::AsyncWrite;

use wp_mysqldump::dumper::output::{close_output, open_output, wants_gzip};
use wp_mysqldump::dumper::script::{write_footer, write_preamble};
use wp_mysqldump::mysql::redact;
use wp_mysqldump::{DumpConf, DumpEngine, DumpOptions, DumpSummary, MySqlConnector, MysqlConf};

/// Dump a MySQL database with per-table column substitution, row filters and policies
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wp-mysqldump",
    version,
    about = "Dump a MySQL database as a SQL script",
    after_help = "EXAMPLES:\n    \
        wp-mysqldump --dsn mysql://root:pw@localhost:3306/shop -o shop.sql\n    \
        wp-mysqldump -c dump.toml --lock-tables -e 500\n    \
        wp-mysqldump -c dump.toml -o shop.sql.gz\n    \
        wp-mysqldump -c dump.toml -t users -t orders > partial.sql"
)]
struct CliArgs {
    /// TOML config file ([mysql], [dump], [select.<table>], [where], [filter])
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Connection URL, overrides [mysql] (MYSQL_URL in the environment wins over both)
    #[arg(long, value_name = "URL")]
    dsn: Option<String>,

    /// Output file; `-` writes to stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Gzip the script (implied by a `.gz` output file)
    #[arg(short = 'z', long)]
    compress: bool,

    /// Hold a read lock on each table while its data is read
    #[arg(long)]
    lock_tables: bool,

    /// Abort when LOCK/FLUSH/UNLOCK TABLES fail instead of logging them
    #[arg(long)]
    strict_locks: bool,

    /// Rows per INSERT statement (0 = one statement per table)
    #[arg(short = 'e', long, value_name = "ROWS")]
    extended_insert_rows: Option<usize>,

    /// Dump only these tables, in the given order
    #[arg(short = 't', long = "table", value_name = "NAME")]
    tables: Vec<String>,

    /// Skip the script preamble and footer
    #[arg(long)]
    no_header: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl CliArgs {
    fn load_conf(&self) -> anyhow::Result<DumpConf> {
        let mut conf = match &self.config {
            Some(path) => DumpConf::load(path)?,
            None => DumpConf::default(),
        };
        if let Some(dsn) = &self.dsn {
            conf.mysql = MysqlConf::from_url(dsn)?;
        }
        if let Some(output) = &self.output {
            conf.dump.output = Some(output.clone());
        }
        if self.compress {
            conf.dump.compress = true;
        }
        if self.lock_tables {
            conf.dump.use_table_lock = true;
        }
        if self.strict_locks {
            conf.dump.strict_locks = true;
        }
        if let Some(rows) = self.extended_insert_rows {
            conf.dump.extended_insert_rows = rows;
        }
        if self.no_header {
            conf.dump.header = false;
        }
        conf.validate()?;
        Ok(conf)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

async fn dump<W>(
    w: &mut W,
    conn: &mut MySqlConnector,
    conf: &DumpConf,
    opts: &DumpOptions,
    tables: &[String],
) -> anyhow::Result<DumpSummary>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    if conf.dump.header {
        write_preamble(w, conn.database(), &Local::now()).await?;
    }
    let mut engine = DumpEngine::new(conn, opts);
    let summary = if tables.is_empty() {
        engine.write_tables(w).await?
    } else {
        engine.write_selected_tables(w, tables).await?
    };
    if conf.dump.header {
        write_footer(w, &Local::now()).await?;
    }
    Ok(summary)
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let conf = args.load_conf().context("invalid configuration")?;
    let opts = conf.to_options()?;

    let url = conf.mysql.get_database_url();
    let mut conn = MySqlConnector::connect(&conf.mysql)
        .await
        .with_context(|| format!("connect {}", redact(&url)))?;

    let path = conf.output_path();
    let mut w = open_output(path, wants_gzip(path, conf.dump.compress)).await?;
    let timer = Instant::now();

    // tables finished before a failure still reach the output
    let dumped = dump(&mut w, &mut conn, &conf, &opts, &args.tables).await;
    let closed = close_output(&mut w).await;
    if let (Err(_), Err(e)) = (&dumped, &closed) {
        error!("{:#}", e);
    }
    let summary = dumped?;
    closed?;
    conn.close().await?;

    info!(
        "dump finished: {} tables, {} skipped, {} rows in {:.1}s",
        summary.tables,
        summary.skipped,
        summary.rows,
        timer.elapsed().as_secs_f64()
    );
    Ok(())
}

use std::path::Path;

use anyhow::Context;
use async_compression::tokio::write::GzipEncoder;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

pub type DumpSink = BufWriter<Box<dyn AsyncWrite + Unpin + Send>>;

/// `.gz` 结尾的输出路径自动压缩。
pub fn wants_gzip(path: Option<&str>, compress: bool) -> bool {
    compress
        || path.is_some_and(|p| {
            Path::new(p)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
        })
}

/// Opens the script destination: a file, or stdout for `None`, gzip-wrapped when asked.
pub async fn open_output(path: Option<&str>, gzip: bool) -> anyhow::Result<DumpSink> {
    let raw: Box<dyn AsyncWrite + Unpin + Send> = match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("create output {}", path))?;
            if gzip {
                Box::new(GzipEncoder::new(file))
            } else {
                Box::new(file)
            }
        }
        None if gzip => Box::new(GzipEncoder::new(tokio::io::stdout())),
        None => Box::new(tokio::io::stdout()),
    };
    Ok(BufWriter::new(raw))
}

/// Flushes buffered bytes and finishes the stream (writes the gzip trailer).
pub async fn close_output<W>(w: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    w.flush().await.context("flush output")?;
    w.shutdown().await.context("close output")?;
    Ok(())
}

//! The query child: a long-running process that answers queries on stdout.
//!
//! Every query is written to the child's stdin as one line. The child answers
//! with one protocol message per line. Its stderr is forwarded to the log.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running query child.
pub struct ChildProcess {
    child: Child,
    command: String,
}

impl ChildProcess {
    /// Starts `command` through `sh -c`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Fails when the shell cannot be started.
    pub fn spawn(command: &str) -> Result<(Self, QueryWriter<ChildStdin>, ChildStdout)> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start child command: {command}"))?;

        let stdin = child.stdin.take().context("child stdin was not captured")?;
        let stdout = child.stdout.take().context("child stdout was not captured")?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "lighthouse::child", "{line}");
                }
            });
        }

        tracing::info!(command, pid = child.id(), "child started");
        Ok((
            Self {
                child,
                command: command.to_string(),
            },
            QueryWriter::new(stdin),
            stdout,
        ))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Terminates the child (if it is still running) and reaps it.
    ///
    /// # Errors
    /// Fails when the child cannot be signalled or waited on.
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait().context("poll child status")? {
            tracing::debug!(%status, "child already exited");
            return Ok(status);
        }
        self.child.start_kill().context("signal child")?;
        let status = self.child.wait().await.context("wait for child")?;
        tracing::debug!(%status, "child stopped");
        Ok(status)
    }
}

/// Writes queries to the child, one line each.
pub struct QueryWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> QueryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes `query` followed by a newline and flushes.
    ///
    /// # Errors
    /// Returns the underlying I/O error, typically a broken pipe once the
    /// child has exited.
    pub async fn write_query(&mut self, query: &str) -> std::io::Result<()> {
        self.inner.write_all(query.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await
    }
}

/// Moves a [`QueryWriter`] onto its own task.
///
/// Queries sent on the returned channel are written in order. The task ends
/// when every sender is dropped or the child stops accepting input; dropping
/// the writer closes the child's stdin.
pub fn spawn_query_writer<W>(mut writer: QueryWriter<W>) -> (mpsc::UnboundedSender<String>, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        while let Some(query) = rx.recv().await {
            if let Err(err) = writer.write_query(&query).await {
                tracing::warn!(%err, "child stopped accepting queries");
                break;
            }
            tracing::trace!(query, "query sent");
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn query_is_written_as_one_line() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut writer = QueryWriter::new(client);
        writer.write_query("a").await.unwrap();
        drop(writer);

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "a\n");
    }

    #[tokio::test]
    async fn writer_task_preserves_order() {
        let (client, mut server) = tokio::io::duplex(256);
        let (tx, handle) = spawn_query_writer(QueryWriter::new(client));
        for query in ["f", "fi", "fir", ""] {
            tx.send(query.to_string()).unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "f\nfi\nfir\n\n");
    }

    #[tokio::test]
    async fn writer_task_stops_on_broken_pipe() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (tx, handle) = spawn_query_writer(QueryWriter::new(client));
        tx.send("lost".to_string()).unwrap();
        handle.await.unwrap();
        assert!(tx.send("after".to_string()).is_err());
    }

    #[tokio::test]
    async fn echo_child_answers_queries() {
        let (child, mut writer, stdout) =
            ChildProcess::spawn(r#"while read -r q; do printf '{%s|echo %s}\n' "$q" "$q"; done"#)
                .unwrap();
        writer.write_query("hello").await.unwrap();

        let mut lines = BufReader::new(stdout).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "{hello|echo hello}");

        let set = crate::protocol::decode(line.as_bytes()).unwrap();
        assert_eq!(set.get(0).unwrap().action, Some("echo hello"));

        child.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_reaps_exited_child() {
        let (child, _writer, _stdout) = ChildProcess::spawn("exit 3").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let status = child.shutdown().await.unwrap();
        assert!(status.code() == Some(3) || status.code().is_none());
    }

    #[tokio::test]
    async fn shutdown_kills_running_child() {
        let (child, _writer, _stdout) = ChildProcess::spawn("sleep 30").unwrap();
        assert!(child.id().is_some());
        assert_eq!(child.command(), "sleep 30");
        let status = child.shutdown().await.unwrap();
        assert!(!status.success());
    }
}

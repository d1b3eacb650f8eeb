use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::transport::jsonrpc::McpServer;

/// Serves newline-delimited JSON-RPC on the process's stdin/stdout until EOF.
pub async fn serve_stdio(server: McpServer) -> std::io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(server, stdin, stdout).await
}

/// Reads one message per line from `input` and writes one response line per
/// request to `output`. Blank lines are skipped; notifications produce no
/// output. Returns when `input` reaches EOF.
pub async fn serve<R, W>(server: McpServer, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("MCP server listening on stdio");
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = server.handle_message(&line).await else {
            continue;
        };

        let mut payload = serde_json::to_vec(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        payload.push(b'\n');
        output.write_all(&payload).await?;
        output.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

use anyhow::Result;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

/// Re-frame a raw byte stream into complete text lines.
///
/// Streamed chat responses arrive as server-sent-event-style payloads where
/// one HTTP chunk may hold a partial line or several lines. The buffer keeps
/// the unterminated tail until the next chunk completes it; when the stream
/// ends, a non-empty tail is flushed as a final line so no tokens are lost.
pub(crate) fn split_lines<S, B, E>(byte_stream: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    byte_stream
        .map(Some)
        .chain(futures::stream::once(futures::future::ready(None)))
        .scan(String::new(), |buf, chunk| {
            let lines: Vec<Result<String>> = match chunk {
                Some(Ok(bytes)) => {
                    buf.push_str(&String::from_utf8_lossy(bytes.as_ref()));
                    let mut lines = Vec::new();
                    while let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        let line = line.trim().to_string();
                        if !line.is_empty() {
                            lines.push(Ok(line));
                        }
                    }
                    lines
                }
                Some(Err(e)) => vec![Err(anyhow::Error::new(e))],
                None => {
                    let tail = buf.trim().to_string();
                    buf.clear();
                    if tail.is_empty() {
                        Vec::new()
                    } else {
                        vec![Ok(tail)]
                    }
                }
            };
            futures::future::ready(Some(futures::stream::iter(lines)))
        })
        .flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    async fn collect(chunks: Vec<&str>) -> Vec<String> {
        let owned: Vec<Vec<u8>> = chunks.into_iter().map(|c| c.as_bytes().to_vec()).collect();
        let stream = futures::stream::iter(owned.into_iter().map(Ok::<_, Infallible>));
        split_lines(stream)
            .map(|line| line.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let lines = collect(vec!["data: he", "llo\ndata: wor", "ld\n"]).await;
        assert_eq!(lines, vec!["data: hello", "data: world"]);
    }

    #[tokio::test]
    async fn drops_blank_lines() {
        let lines = collect(vec!["a\n\n\nb\n"]).await;
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unterminated_tail_is_flushed_at_end() {
        // a stream that ends mid-line must not lose its last tokens
        let lines = collect(vec!["complete\npartial"]).await;
        assert_eq!(lines, vec!["complete", "partial"]);
    }

    #[tokio::test]
    async fn tail_of_whitespace_is_not_flushed() {
        let lines = collect(vec!["a\n", "  "]).await;
        assert_eq!(lines, vec!["a"]);
    }
}

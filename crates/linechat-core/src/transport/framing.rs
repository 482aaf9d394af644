//! Newline-delimited record framing.
//!
//! TCP is a byte stream: one read may return half a record or several.  A
//! `BufReader` plus `read_until(b'\n')` turns the stream back into records.
//! Reads are capped with `take` so a peer that never sends a newline cannot
//! make us buffer without bound.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Result of reading one record.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RecordRead {
    /// A complete record, line terminator removed.
    Record(String),
    /// A line longer than the limit was read and thrown away.  Carries the
    /// number of bytes discarded.
    Oversized(usize),
    /// The peer closed the stream.
    Eof,
}

/// Reads the next non-blank record, at most `limit` bytes long.
///
/// The limit applies to the record itself; a `\n` or `\r\n` terminator does
/// not count toward it.  Invalid UTF-8 is replaced rather than rejected, so the
/// record still reaches the decoder and is answered like any other malformed
/// input.  A final line without a terminator is returned as a record; the
/// following call reports [`RecordRead::Eof`].
pub(crate) async fn read_record<R>(
    reader: &mut R,
    limit: usize,
    buf: &mut Vec<u8>,
) -> io::Result<RecordRead>
where
    R: AsyncBufRead + Unpin,
{
    // Room for a record of exactly `limit` bytes plus "\r\n".
    let cap = (limit as u64).saturating_add(2);

    loop {
        buf.clear();
        let n = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
        if n == 0 {
            return Ok(RecordRead::Eof);
        }

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && n as u64 == cap {
            let discarded = n + discard_line(reader, cap, buf).await?;
            return Ok(RecordRead::Oversized(discarded));
        }

        let line = trim_line_ending(buf);
        if line.len() > limit {
            return Ok(RecordRead::Oversized(n));
        }
        if line.is_empty() {
            continue;
        }
        return Ok(RecordRead::Record(String::from_utf8_lossy(line).into_owned()));
    }
}

/// Consumes bytes up to and including the next '\n' (or EOF).
async fn discard_line<R>(reader: &mut R, cap: u64, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = 0;
    loop {
        buf.clear();
        let n = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
        total += n;
        if n == 0 || buf.last() == Some(&b'\n') {
            return Ok(total);
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Writes `record` followed by '\n' and flushes, so the peer sees it promptly.
pub(crate) async fn write_record<W>(writer: &mut W, record: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(record.len() + 1);
    line.extend_from_slice(record.as_bytes());
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

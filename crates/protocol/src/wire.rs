//! Byte layouts for both wire versions.
//!
//! # Legacy
//!
//! ```text
//! SIZE    (client -> server): ASCII decimal payload length, no terminator
//! ACK     (server -> client): up to 16 bytes, content ignored ("SIZE_OK")
//! PAYLOAD (client -> server): raw image bytes
//! CAPTION (server -> client): UTF-8 text, ended by close or a quiet pause
//! ```
//!
//! # Framed
//!
//! ```text
//! SIZE    (client -> server): [8 bytes BE: payload length]
//! ACK     (server -> client): [1 byte: status][15 bytes: reserved]
//! PAYLOAD (client -> server): [length bytes: raw image]
//! CAPTION (server -> client): [4 bytes BE: caption_len][caption_len bytes: UTF-8]
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::error::{ProtocolError, WireError};
use crate::payload::{Caption, ImagePayload, truncate_on_char_boundary};
use crate::{ACK_LEN, ACK_OK, LEGACY_ACK, LEGACY_SIZE_READ_LEN, WireVersion};

/// Decimal text of a payload length, as sent by the legacy client.
pub fn encode_size_text(len: u64) -> String {
    len.to_string()
}

/// Parses a legacy size announcement. Surrounding whitespace is tolerated.
pub fn parse_size_text(raw: &[u8]) -> Result<u64, ProtocolError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| ProtocolError::InvalidSizeAnnouncement(format!("{raw:?}")))?
        .trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidSizeAnnouncement(text.to_string()));
    }
    text.parse()
        .map_err(|_| ProtocolError::InvalidSizeAnnouncement(text.to_string()))
}

/// Writes the payload length announcement and flushes.
pub async fn write_size_announcement<W: AsyncWrite + Unpin>(
    writer: &mut W,
    version: WireVersion,
    len: u64,
) -> Result<(), WireError> {
    match version {
        WireVersion::Legacy => writer.write_all(encode_size_text(len).as_bytes()).await?,
        WireVersion::Framed => writer.write_u64(len).await?,
    }
    writer.flush().await?;
    Ok(())
}

/// Reads the payload length announcement (server side).
pub async fn read_size_announcement<R: AsyncRead + Unpin>(
    reader: &mut R,
    version: WireVersion,
) -> Result<u64, WireError> {
    match version {
        WireVersion::Legacy => {
            let mut buf = [0u8; LEGACY_SIZE_READ_LEN];
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Err(unexpected_eof("connection closed before size announcement").into());
            }
            Ok(parse_size_text(&buf[..n])?)
        }
        WireVersion::Framed => Ok(reader.read_u64().await?),
    }
}

/// Waits for the server's acknowledgement (client side).
///
/// Legacy: a single read of up to [`ACK_LEN`] bytes; any non-empty read
/// unblocks. Framed: exactly [`ACK_LEN`] bytes, the first being a status
/// that must equal [`ACK_OK`].
pub async fn read_ack<R: AsyncRead + Unpin>(
    reader: &mut R,
    version: WireVersion,
) -> Result<(), WireError> {
    let mut buf = [0u8; ACK_LEN];
    match version {
        WireVersion::Legacy => {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Err(unexpected_eof("connection closed before acknowledgement").into());
            }
            trace!(len = n, ack = ?String::from_utf8_lossy(&buf[..n]), "legacy ack received");
            Ok(())
        }
        WireVersion::Framed => {
            reader.read_exact(&mut buf).await?;
            let status = buf[0];
            if status != ACK_OK {
                return Err(ProtocolError::Rejected { status }.into());
            }
            Ok(())
        }
    }
}

/// Accepts the announced payload (server side) and flushes.
pub async fn write_ack<W: AsyncWrite + Unpin>(
    writer: &mut W,
    version: WireVersion,
) -> Result<(), WireError> {
    match version {
        WireVersion::Legacy => writer.write_all(LEGACY_ACK).await?,
        WireVersion::Framed => writer.write_all(&framed_ack(ACK_OK)).await?,
    }
    writer.flush().await?;
    Ok(())
}

/// Refuses the announced payload (server side).
///
/// The legacy protocol has no rejection message; closing the connection is
/// the only signal, so nothing is written.
pub async fn write_rejection<W: AsyncWrite + Unpin>(
    writer: &mut W,
    version: WireVersion,
    status: u8,
) -> Result<(), WireError> {
    if version == WireVersion::Framed {
        writer.write_all(&framed_ack(status)).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn framed_ack(status: u8) -> [u8; ACK_LEN] {
    let mut buf = [0u8; ACK_LEN];
    buf[0] = status;
    buf
}

/// Writes the whole payload and flushes.
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &ImagePayload,
) -> Result<(), WireError> {
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads an announced payload (server side).
///
/// Legacy stops early if the client closes, keeping what arrived. Framed
/// requires every announced byte.
pub async fn read_payload<R: AsyncRead + Unpin>(
    reader: &mut R,
    version: WireVersion,
    size: u64,
) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(usize::MAX).min(1 << 20));
    match version {
        WireVersion::Legacy => {
            reader.take(size).read_to_end(&mut buf).await?;
            if (buf.len() as u64) < size {
                warn!(
                    expected = size,
                    received = buf.len(),
                    "client closed before sending the full payload"
                );
            }
        }
        WireVersion::Framed => {
            let n = reader.take(size).read_to_end(&mut buf).await?;
            if (n as u64) < size {
                return Err(unexpected_eof("connection closed during payload").into());
            }
        }
    }
    Ok(buf)
}

/// Reads the caption (client side), bounded by `max_len` bytes.
///
/// Legacy gathers bytes with [`read_legacy_caption_into`]. Framed rejects
/// a declared length above `max_len` before allocating; `settle` is unused
/// there.
pub async fn read_caption<R: AsyncRead + Unpin>(
    reader: &mut R,
    version: WireVersion,
    max_len: usize,
    settle: Duration,
) -> Result<Caption, WireError> {
    match version {
        WireVersion::Legacy => {
            let mut buf = Vec::new();
            read_legacy_caption_into(reader, &mut buf, max_len, settle).await?;
            Ok(Caption::from_bytes(&buf)?)
        }
        WireVersion::Framed => {
            let declared = reader.read_u32().await?;
            if declared as u64 > max_len as u64 {
                return Err(ProtocolError::CaptionTooLarge {
                    declared: declared as u64,
                    max: max_len,
                }
                .into());
            }
            if declared == 0 {
                return Err(ProtocolError::EmptyCaption.into());
            }
            let mut buf = vec![0u8; declared as usize];
            reader.read_exact(&mut buf).await?;
            Ok(Caption::from_bytes(&buf)?)
        }
    }
}

/// Appends legacy caption bytes to `buf`.
///
/// The legacy response has no length, so reading ends at whichever comes
/// first: the server closing, `max_len` bytes gathered, or no new bytes for
/// `settle` once something has arrived. The first read waits without a
/// limit; callers bound it with their own deadline and may still use what
/// `buf` holds when that deadline fires. A read error after bytes arrived
/// ends the read without failing it.
pub async fn read_legacy_caption_into<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
    settle: Duration,
) -> Result<(), WireError> {
    let mut chunk = [0u8; 1024];
    while buf.len() < max_len {
        let want = (max_len - buf.len()).min(chunk.len());
        let read = if buf.is_empty() {
            reader.read(&mut chunk[..want]).await
        } else {
            match tokio::time::timeout(settle, reader.read(&mut chunk[..want])).await {
                Ok(read) => read,
                Err(_) => {
                    trace!(received = buf.len(), "caption settled");
                    return Ok(());
                }
            }
        };
        match read {
            Ok(0) => return Ok(()),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if !buf.is_empty() => {
                debug!(error = %e, received = buf.len(), "read failed after caption bytes");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
    debug!(max_len, "caption reached the read cap; any remainder is dropped");
    Ok(())
}

/// Writes the caption (server side), truncated to `max_len` bytes on a
/// character boundary, and flushes.
pub async fn write_caption<W: AsyncWrite + Unpin>(
    writer: &mut W,
    version: WireVersion,
    caption: &str,
    max_len: usize,
) -> Result<(), WireError> {
    let text = truncate_on_char_boundary(caption, max_len);
    if version == WireVersion::Framed {
        let len = u32::try_from(text.len()).map_err(|_| ProtocolError::CaptionTooLarge {
            declared: text.len() as u64,
            max: max_len,
        })?;
        writer.write_u32(len).await?;
    }
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn unexpected_eof(msg: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ACK_TOO_LARGE, DEFAULT_MAX_CAPTION_LEN};

    const SETTLE: Duration = Duration::from_millis(50);

    #[test]
    fn size_text_is_plain_decimal() {
        assert_eq!(encode_size_text(0), "0");
        assert_eq!(encode_size_text(48213), "48213");
    }

    #[test]
    fn parse_size_text_tolerates_whitespace() {
        assert_eq!(parse_size_text(b" 1024\n").unwrap(), 1024);
    }

    #[test]
    fn parse_size_text_rejects_garbage() {
        assert!(parse_size_text(b"").is_err());
        assert!(parse_size_text(b"-5").is_err());
        assert!(parse_size_text(b"12ab").is_err());
        assert!(parse_size_text(&[0xFF, 0xFE]).is_err());
        assert!(parse_size_text(b"99999999999999999999").is_err());
    }

    #[tokio::test]
    async fn legacy_size_announcement_has_no_terminator() {
        let mut buf = Vec::new();
        write_size_announcement(&mut buf, WireVersion::Legacy, 48213)
            .await
            .unwrap();
        assert_eq!(buf, b"48213");
    }

    #[tokio::test]
    async fn framed_size_announcement_is_u64_be() {
        let mut buf = Vec::new();
        write_size_announcement(&mut buf, WireVersion::Framed, 258)
            .await
            .unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 1, 2]);

        let mut cursor = &buf[..];
        let size = read_size_announcement(&mut cursor, WireVersion::Framed)
            .await
            .unwrap();
        assert_eq!(size, 258);
    }

    #[tokio::test]
    async fn legacy_size_read_rejects_eof() {
        let mut cursor: &[u8] = &[];
        let err = read_size_announcement(&mut cursor, WireVersion::Legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn legacy_ack_accepts_short_reply() {
        let mut cursor: &[u8] = b"SIZE_OK";
        read_ack(&mut cursor, WireVersion::Legacy).await.unwrap();
    }

    #[tokio::test]
    async fn legacy_ack_fails_on_close() {
        let mut cursor: &[u8] = &[];
        assert!(matches!(
            read_ack(&mut cursor, WireVersion::Legacy).await,
            Err(WireError::Io(_))
        ));
    }

    #[tokio::test]
    async fn framed_ack_zero_bytes_is_ok() {
        let zeros = [0u8; ACK_LEN];
        let mut cursor = &zeros[..];
        read_ack(&mut cursor, WireVersion::Framed).await.unwrap();
    }

    #[tokio::test]
    async fn framed_ack_rejection_carries_status() {
        let mut buf = Vec::new();
        write_rejection(&mut buf, WireVersion::Framed, ACK_TOO_LARGE)
            .await
            .unwrap();
        assert_eq!(buf.len(), ACK_LEN);

        let mut cursor = &buf[..];
        let err = read_ack(&mut cursor, WireVersion::Framed).await.unwrap_err();
        assert!(matches!(
            err,
            WireError::Protocol(ProtocolError::Rejected { status }) if status == ACK_TOO_LARGE
        ));
    }

    #[tokio::test]
    async fn framed_ack_short_read_is_io_error() {
        let mut cursor: &[u8] = &[0u8; 7];
        assert!(matches!(
            read_ack(&mut cursor, WireVersion::Framed).await,
            Err(WireError::Io(_))
        ));
    }

    #[tokio::test]
    async fn legacy_rejection_writes_nothing() {
        let mut buf = Vec::new();
        write_rejection(&mut buf, WireVersion::Legacy, ACK_TOO_LARGE)
            .await
            .unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn legacy_caption_reads_until_close() {
        let mut cursor: &[u8] = b"  a cat sitting on a mat \n";
        let caption = read_caption(&mut cursor, WireVersion::Legacy, DEFAULT_MAX_CAPTION_LEN, SETTLE)
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "a cat sitting on a mat");
    }

    #[tokio::test]
    async fn legacy_caption_truncates_at_cap() {
        let body = "x".repeat(5000);
        let mut cursor = body.as_bytes();
        let caption = read_caption(&mut cursor, WireVersion::Legacy, DEFAULT_MAX_CAPTION_LEN, SETTLE)
            .await
            .unwrap();
        assert_eq!(caption.as_str().len(), DEFAULT_MAX_CAPTION_LEN);
    }

    #[tokio::test]
    async fn legacy_caption_completes_while_server_stays_open() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"a cat ").await.unwrap();

        let caption = tokio::time::timeout(
            Duration::from_secs(2),
            read_caption(&mut client, WireVersion::Legacy, DEFAULT_MAX_CAPTION_LEN, SETTLE),
        )
        .await
        .expect("caption read must not wait for close")
        .unwrap();
        assert_eq!(caption.as_str(), "a cat");
        drop(server);
    }

    #[tokio::test]
    async fn legacy_caption_gathers_deliveries_within_settle() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let writer = tokio::spawn(async move {
            server.write_all(b"a dog ").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            server.write_all(b"on a beach").await.unwrap();
            // Hold the stream open past the settle window.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let caption = read_caption(&mut client, WireVersion::Legacy, DEFAULT_MAX_CAPTION_LEN, SETTLE)
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "a dog on a beach");
        writer.abort();
    }

    #[tokio::test]
    async fn legacy_caption_buffer_survives_outer_deadline() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"partial").await.unwrap();

        let mut buf = Vec::new();
        // A settle longer than the deadline: the deadline fires first.
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            read_legacy_caption_into(&mut client, &mut buf, DEFAULT_MAX_CAPTION_LEN, Duration::from_secs(10)),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(buf, b"partial");
        drop(server);
    }

    #[tokio::test]
    async fn legacy_empty_caption_is_protocol_error() {
        let mut cursor: &[u8] = &[];
        assert!(matches!(
            read_caption(&mut cursor, WireVersion::Legacy, DEFAULT_MAX_CAPTION_LEN, SETTLE).await,
            Err(WireError::Protocol(ProtocolError::EmptyCaption))
        ));
    }

    #[tokio::test]
    async fn framed_caption_written_then_read() {
        let mut buf = Vec::new();
        write_caption(&mut buf, WireVersion::Framed, " a cat ", DEFAULT_MAX_CAPTION_LEN)
            .await
            .unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 7]);

        let mut cursor = &buf[..];
        let caption = read_caption(&mut cursor, WireVersion::Framed, DEFAULT_MAX_CAPTION_LEN, SETTLE)
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "a cat");
    }

    #[tokio::test]
    async fn framed_caption_over_cap_rejected_before_body() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5000u32.to_be_bytes());
        let mut cursor = &buf[..];
        let err = read_caption(&mut cursor, WireVersion::Framed, DEFAULT_MAX_CAPTION_LEN, SETTLE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WireError::Protocol(ProtocolError::CaptionTooLarge { declared: 5000, max: 4096 })
        ));
    }

    #[tokio::test]
    async fn framed_caption_zero_length_is_empty() {
        let buf = 0u32.to_be_bytes();
        let mut cursor = &buf[..];
        assert!(matches!(
            read_caption(&mut cursor, WireVersion::Framed, DEFAULT_MAX_CAPTION_LEN, SETTLE).await,
            Err(WireError::Protocol(ProtocolError::EmptyCaption))
        ));
    }

    #[tokio::test]
    async fn server_truncates_caption_on_char_boundary() {
        let mut buf = Vec::new();
        write_caption(&mut buf, WireVersion::Legacy, "ééé", 5)
            .await
            .unwrap();
        assert_eq!(buf, "éé".as_bytes());
    }

    #[tokio::test]
    async fn legacy_payload_keeps_partial_on_close() {
        let mut cursor: &[u8] = b"abc";
        let data = read_payload(&mut cursor, WireVersion::Legacy, 10)
            .await
            .unwrap();
        assert_eq!(data, b"abc");
    }

    #[tokio::test]
    async fn framed_payload_requires_every_byte() {
        let mut cursor: &[u8] = b"abc";
        assert!(matches!(
            read_payload(&mut cursor, WireVersion::Framed, 10).await,
            Err(WireError::Io(_))
        ));
    }

    #[tokio::test]
    async fn payload_read_stops_at_announced_size() {
        let mut cursor: &[u8] = b"abcdef";
        let data = read_payload(&mut cursor, WireVersion::Framed, 4)
            .await
            .unwrap();
        assert_eq!(data, b"abcd");
    }
}

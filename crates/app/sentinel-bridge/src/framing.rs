//! Native messaging framing: a 4-byte little-endian length, then that many
//! bytes of UTF-8 JSON.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{BridgeError, BridgeResult};

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly
/// between frames.
pub async fn read_framed<R, T>(reader: &mut R, max_frame_size: usize) -> BridgeResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];

    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 {
        return Err(BridgeError::EmptyFrame);
    }
    if len > max_frame_size {
        return Err(BridgeError::FrameTooLarge {
            len,
            limit: max_frame_size,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    Ok(Some(serde_json::from_slice(&buf)?))
}

pub async fn write_framed<W, T>(writer: &mut W, message: &T) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec(message)?;
    let len = u32::try_from(json.len()).map_err(|_| BridgeError::FrameTooLarge {
        len: json.len(),
        limit: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OutboundMessage;
    use serde_json::{Value, json};

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[tokio::test]
    async fn writes_little_endian_length_prefix() {
        let mut out = Vec::new();
        let message = OutboundMessage::CheckUrl {
            url: "https://a.b".into(),
        };
        write_framed(&mut out, &message).await.unwrap();

        let body = br#"{"type":"CHECK_URL","url":"https://a.b"}"#;
        assert_eq!(&out[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&out[4..], body);
    }

    #[tokio::test]
    async fn reads_consecutive_frames_then_eof() {
        let mut input = frame(br#"{"action":"BLOCK"}"#);
        input.extend(frame(br#"{"status":"ok"}"#));
        let mut reader = input.as_slice();

        let first: Option<Value> = read_framed(&mut reader, 1024).await.unwrap();
        let second: Option<Value> = read_framed(&mut reader, 1024).await.unwrap();
        let end: Option<Value> = read_framed(&mut reader, 1024).await.unwrap();

        assert_eq!(first, Some(json!({"action": "BLOCK"})));
        assert_eq!(second, Some(json!({"status": "ok"})));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn rejects_empty_frame() {
        let input = 0u32.to_le_bytes();
        let result: BridgeResult<Option<Value>> = read_framed(&mut input.as_slice(), 1024).await;
        assert!(matches!(result, Err(BridgeError::EmptyFrame)));
    }

    #[tokio::test]
    async fn rejects_oversized_frame_before_reading_body() {
        let input = 2048u32.to_le_bytes();
        let result: BridgeResult<Option<Value>> = read_framed(&mut input.as_slice(), 1024).await;
        assert!(matches!(
            result,
            Err(BridgeError::FrameTooLarge {
                len: 2048,
                limit: 1024
            })
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_an_io_error() {
        let mut input = 10u32.to_le_bytes().to_vec();
        input.extend_from_slice(b"{}");
        let result: BridgeResult<Option<Value>> = read_framed(&mut input.as_slice(), 1024).await;
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let input = frame(b"not json");
        let result: BridgeResult<Option<Value>> = read_framed(&mut input.as_slice(), 1024).await;
        assert!(matches!(result, Err(BridgeError::Json(_))));
    }

    #[tokio::test]
    async fn round_trips_through_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let sent = json!({"type": "UPDATE_CONFIG", "payload": {"is_active": false, "whitelist": []}});

        let writer = tokio::spawn(async move {
            write_framed(&mut client, &sent).await.unwrap();
            sent
        });
        let received: Option<Value> = read_framed(&mut server, 1024).await.unwrap();

        assert_eq!(received, Some(writer.await.unwrap()));
    }
}

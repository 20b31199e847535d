//! Length-prefixed framing: `"<decimal byte length> <body>"` in both directions.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Longest accepted length prefix; anything longer cannot fit under `MAX_FRAME_LEN`.
const MAX_PREFIX_DIGITS: usize = 10;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame length prefix is not a decimal number: {0:?}")]
    BadLength(String),
    #[error("frame of {0} bytes exceeds the {} byte limit", MAX_FRAME_LEN)]
    TooLarge(usize),
    #[error("connection closed before the frame was complete")]
    Truncated,
    #[error("frame body is not valid UTF-8")]
    NotUtf8,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn encode_frame(body: &str) -> Vec<u8> {
    format!("{} {}", body.len(), body).into_bytes()
}

/// Reads exactly one frame and returns its body.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, FrameError> {
    let mut prefix = Vec::with_capacity(MAX_PREFIX_DIGITS);
    loop {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte).await? == 0 {
            return Err(FrameError::Truncated);
        }
        match byte[0] {
            b' ' if !prefix.is_empty() => break,
            b'0'..=b'9' if prefix.len() < MAX_PREFIX_DIGITS => prefix.push(byte[0]),
            other => {
                prefix.push(other);
                return Err(FrameError::BadLength(
                    String::from_utf8_lossy(&prefix).into_owned(),
                ));
            }
        }
    }

    let text = String::from_utf8_lossy(&prefix).into_owned();
    let len: usize = text.parse().map_err(|_| FrameError::BadLength(text.clone()))?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;
    String::from_utf8(body).map_err(|_| FrameError::NotUtf8)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &str) -> Result<(), FrameError> {
    writer.write_all(&encode_frame(body)).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_counts_bytes_not_chars() {
        assert_eq!(encode_frame("[]"), b"2 []".to_vec());
        assert_eq!(encode_frame("\"é\""), "4 \"é\"".as_bytes().to_vec());
    }

    #[tokio::test]
    async fn test_read_frame() {
        let mut mock = Builder::new().read(b"8 [\"JOIN\"]").build();
        let body = read_frame(&mut mock).await.unwrap();
        assert_eq!(body, "[\"JOIN\"]");
    }

    #[tokio::test]
    async fn test_read_frame_split_across_reads() {
        let mut mock = Builder::new()
            .read(b"1")
            .read(b"2 [true, ")
            .read(b"null]")
            .build();
        let body = read_frame(&mut mock).await.unwrap();
        assert_eq!(body, "[true, null]");
    }

    #[tokio::test]
    async fn test_read_frame_rejects_bad_prefix() {
        let mut mock = Builder::new().read(b"x").build();
        assert!(matches!(
            read_frame(&mut mock).await,
            Err(FrameError::BadLength(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_missing_length() {
        let mut mock = Builder::new().read(b" ").build();
        assert!(matches!(
            read_frame(&mut mock).await,
            Err(FrameError::BadLength(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized() {
        let mut mock = Builder::new().read(b"999999999 ").build();
        assert!(matches!(
            read_frame(&mut mock).await,
            Err(FrameError::TooLarge(999_999_999))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_truncated_body() {
        let mut mock = Builder::new().read(b"10 short").build();
        assert!(matches!(
            read_frame(&mut mock).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_write_frame() {
        let mut mock = Builder::new().write(b"5 hello").build();
        write_frame(&mut mock, "hello").await.unwrap();
    }
}

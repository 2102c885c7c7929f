//! Wire protocol shared by the webterm client and the PTY host.
//!
//! Frames are msgpack arrays with a leading kind string, e.g.
//! `["input", <bytes>]` or `["resize", cols, rows]`. The host speaks the
//! same framing, so both sides decode with [`Frame::decode`].

use rmpv::Value;
use thiserror::Error;

/// Graceful closure initiated by either peer.
pub const CLOSE_NORMAL: u16 = 1000;
/// Peer is going away (page navigation, host shutdown).
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Synthetic code for a connection that died without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// `true` for close codes that mean the peer left on purpose.
pub fn is_normal_closure(code: u16) -> bool {
    code == CLOSE_NORMAL || code == CLOSE_GOING_AWAY
}

/// Errors raised while encoding or decoding wire frames.
///
/// A decode failure never tears the connection down; the offending frame
/// is dropped and logged by the caller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode msgpack frame: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("failed to encode msgpack frame: {0}")]
    Encode(#[from] rmpv::encode::Error),

    #[error("frame is not a tagged array")]
    NotAFrame,

    #[error("unrecognized frame kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} frame")]
    Malformed { kind: &'static str },
}

/// A single wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keyboard bytes from the client to the PTY.
    Input(Vec<u8>),
    /// PTY output bytes for the renderer.
    Output(Vec<u8>),
    /// Terminal dimension change. Also used as the redraw trigger after a
    /// reconnect: full-screen programs repaint on a dimension notification
    /// even when the geometry is unchanged.
    Resize { cols: u16, rows: u16 },
}

impl Frame {
    /// Wire kind tag for this frame.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Output(_) => "output",
            Self::Resize { .. } => "resize",
        }
    }

    /// Encode as a msgpack byte buffer.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let value = match self {
            Self::Input(data) => Value::Array(vec![
                Value::String("input".into()),
                Value::Binary(data.clone()),
            ]),
            Self::Output(data) => Value::Array(vec![
                Value::String("output".into()),
                Value::Binary(data.clone()),
            ]),
            Self::Resize { cols, rows } => Value::Array(vec![
                Value::String("resize".into()),
                Value::Integer(i64::from(*cols).into()),
                Value::Integer(i64::from(*rows).into()),
            ]),
        };

        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &value)?;
        Ok(bytes)
    }

    /// Decode a msgpack byte buffer into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let value = rmpv::decode::read_value(&mut cursor)?;

        let Value::Array(items) = value else {
            return Err(ProtocolError::NotAFrame);
        };
        let Some(kind) = items.first().and_then(Value::as_str) else {
            return Err(ProtocolError::NotAFrame);
        };

        match kind {
            "input" => match items.get(1) {
                Some(Value::Binary(data)) => Ok(Self::Input(data.clone())),
                _ => Err(ProtocolError::Malformed { kind: "input" }),
            },
            "output" => match items.get(1) {
                Some(Value::Binary(data)) => Ok(Self::Output(data.clone())),
                _ => Err(ProtocolError::Malformed { kind: "output" }),
            },
            "resize" => {
                let dim = |idx: usize| {
                    items
                        .get(idx)
                        .and_then(Value::as_u64)
                        .and_then(|v| u16::try_from(v).ok())
                };
                match (dim(1), dim(2)) {
                    (Some(cols), Some(rows)) => Ok(Self::Resize { cols, rows }),
                    _ => Err(ProtocolError::Malformed { kind: "resize" }),
                }
            }
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_frame_round_trip() {
        let frame = Frame::Input(b"echo reconnected\r".to_vec());
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn resize_frame_round_trip() {
        let frame = Frame::Resize {
            cols: 120,
            rows: 40,
        };
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn output_frame_carries_raw_bytes() {
        let frame = Frame::Output(vec![0x1b, b'[', b'2', b'J']);
        let bytes = frame.encode().unwrap();
        match Frame::decode(&bytes).unwrap() {
            Frame::Output(data) => assert_eq!(data, vec![0x1b, b'[', b'2', b'J']),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let value = Value::Array(vec![Value::String("telemetry".into())]);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &value).unwrap();

        match Frame::decode(&bytes) {
            Err(ProtocolError::UnknownKind(kind)) => assert_eq!(kind, "telemetry"),
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn malformed_resize_is_rejected() {
        let value = Value::Array(vec![
            Value::String("resize".into()),
            Value::String("eighty".into()),
            Value::Integer(24.into()),
        ]);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &value).unwrap();

        assert!(matches!(
            Frame::decode(&bytes),
            Err(ProtocolError::Malformed { kind: "resize" })
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            Frame::decode(&[0xc1, 0xff, 0x00]),
            Err(ProtocolError::Decode(_) | ProtocolError::NotAFrame)
        ));
    }

    #[test]
    fn non_array_is_not_a_frame() {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &Value::String("input".into())).unwrap();
        assert!(matches!(Frame::decode(&bytes), Err(ProtocolError::NotAFrame)));
    }

    #[test]
    fn close_code_classification() {
        assert!(is_normal_closure(CLOSE_NORMAL));
        assert!(is_normal_closure(CLOSE_GOING_AWAY));
        assert!(!is_normal_closure(CLOSE_ABNORMAL));
        assert!(!is_normal_closure(1011));
    }
}

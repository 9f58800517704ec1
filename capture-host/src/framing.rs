//! Native messaging framing: 4-byte native-endian length, then UTF-8 JSON

use feed_capture::CaptureError;
use std::io::{self, Read, Write};

/// Browser-imposed ceiling for host-to-extension messages
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Browser-imposed ceiling for extension-to-host messages
pub const MAX_INBOUND_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Read one frame. `Ok(None)` means the extension closed the pipe.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, CaptureError> {
    let mut length_bytes = [0u8; 4];

    match reader.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_INBOUND_FRAME_LEN {
        return Err(CaptureError::MessageTooLarge(length));
    }

    let mut message = vec![0u8; length];
    reader.read_exact(&mut message)?;

    Ok(Some(message))
}

pub fn write_frame<W: Write>(writer: &mut W, message: &[u8]) -> Result<(), CaptureError> {
    if message.len() > MAX_FRAME_LEN {
        return Err(CaptureError::MessageTooLarge(message.len()));
    }

    let length = message.len() as u32;
    writer.write_all(&length.to_ne_bytes())?;
    writer.write_all(message)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frames_back_to_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, br#"{"type":"a"}"#).unwrap();
        write_frame(&mut buf, br#"{"type":"b"}"#).unwrap();
        assert_eq!(&buf[..4], &12u32.to_ne_bytes());

        let mut reader = Cursor::new(buf);
        assert_eq!(read_frame(&mut reader).unwrap().unwrap(), br#"{"type":"a"}"#);
        assert_eq!(read_frame(&mut reader).unwrap().unwrap(), br#"{"type":"b"}"#);
        assert!(read_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut buf = 10u32.to_ne_bytes().to_vec();
        buf.extend_from_slice(b"abc");
        assert!(read_frame(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_corrupt_length_prefix_rejected_before_allocating() {
        let buf = u32::MAX.to_ne_bytes().to_vec();
        assert!(matches!(
            read_frame(&mut Cursor::new(buf)),
            Err(CaptureError::MessageTooLarge(n)) if n == u32::MAX as usize
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let big = vec![b'x'; MAX_FRAME_LEN + 1];
        let mut sink = Vec::new();
        assert!(matches!(
            write_frame(&mut sink, &big),
            Err(CaptureError::MessageTooLarge(n)) if n == MAX_FRAME_LEN + 1
        ));
        assert!(sink.is_empty());
    }
}

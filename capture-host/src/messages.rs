//! Messages exchanged with the browser extension

use crate::framing::MAX_FRAME_LEN;
use feed_capture::{CaptureError, Command, ExportSnapshot, Notification, Post, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Room left in each chunk frame for the envelope around the posts
const CHUNK_ENVELOPE: usize = 4 * 1024;

const INBOUND_TYPES: &[&str] = &[
    "command",
    "pageLoaded",
    "domInserted",
    "networkResponse",
    "navigated",
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    Command { command: Command },
    /// Full document after a page load, heights already annotated
    PageLoaded {
        url: String,
        #[serde(default)]
        title: Option<String>,
        html: String,
    },
    DomInserted { html: String },
    NetworkResponse { url: String, body: String },
    Navigated {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl Inbound {
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        if !INBOUND_TYPES.contains(&kind) {
            return Err(CaptureError::UnknownMessage(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    Response { response: Response },
    Notification { notification: Notification },
    Scroll { pixels: u32 },
    /// Snapshot without its posts; `chunks` exportChunk frames follow
    ExportHeader {
        delivery: ExportDelivery,
        chunks: usize,
        data: ExportSnapshot,
    },
    ExportChunk {
        index: usize,
        total: usize,
        posts: Vec<Post>,
    },
    Failure { success: bool, error: String },
}

/// Which message an oversized export replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportDelivery {
    Response,
    ScanComplete,
}

impl Outbound {
    pub fn failure(error: &CaptureError) -> Self {
        Outbound::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    /// Serialize into frame payloads. Exports over the frame ceiling are
    /// split into a header followed by post chunks, in capture order.
    pub fn encode(self) -> Result<Vec<Vec<u8>>, CaptureError> {
        let bytes = serde_json::to_vec(&self)?;
        if bytes.len() <= MAX_FRAME_LEN {
            return Ok(vec![bytes]);
        }

        let (delivery, mut data) = match self {
            Outbound::Response {
                response: Response::Exported { data, .. },
            } => (ExportDelivery::Response, data),
            Outbound::Notification {
                notification: Notification::ScanComplete { data, .. },
            } => (ExportDelivery::ScanComplete, data),
            _ => return Err(CaptureError::MessageTooLarge(bytes.len())),
        };

        let chunks = chunk_posts(std::mem::take(&mut data.posts))?;
        let total = chunks.len();
        let mut frames = Vec::with_capacity(total + 1);
        frames.push(serde_json::to_vec(&Outbound::ExportHeader {
            delivery,
            chunks: total,
            data,
        })?);
        for (index, posts) in chunks.into_iter().enumerate() {
            frames.push(serde_json::to_vec(&Outbound::ExportChunk { index, total, posts })?);
        }
        Ok(frames)
    }
}

fn chunk_posts(posts: Vec<Post>) -> Result<Vec<Vec<Post>>, CaptureError> {
    let budget = MAX_FRAME_LEN - CHUNK_ENVELOPE;
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut size = 0;

    for post in posts {
        let len = serde_json::to_vec(&post)?.len() + 1;
        if len > budget {
            return Err(CaptureError::MessageTooLarge(len));
        }
        if size + len > budget {
            chunks.push(std::mem::take(&mut current));
            size = 0;
        }
        size += len;
        current.push(post);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_capture::{ScanMode, ScanStatus, Source};
    use serde_json::json;

    fn large_export(posts: usize, text_len: usize) -> ExportSnapshot {
        let posts = (0..posts)
            .map(|i| Post::new(Source::Dom, &i.to_string(), &"x".repeat(text_len)))
            .collect();
        ExportSnapshot::build(posts, "https://www.facebook.com/groups/x/", Some("X | Facebook"), 60)
    }

    #[test]
    fn test_parse_inbound() {
        let msg = Inbound::parse(br#"{"type":"command","command":{"action":"startAuto","duration":60}}"#).unwrap();
        assert_eq!(msg, Inbound::Command { command: Command::StartAuto { duration: 60 } });

        let msg = Inbound::parse(br#"{"type":"navigated","url":"https://x.test/"}"#).unwrap();
        assert_eq!(msg, Inbound::Navigated { url: "https://x.test/".into(), title: None });
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(
            Inbound::parse(br#"{"type":"reboot"}"#),
            Err(CaptureError::UnknownMessage(t)) if t == "reboot"
        ));
        assert!(matches!(Inbound::parse(b"{nope"), Err(CaptureError::Json(_))));
        assert!(matches!(
            Inbound::parse(br#"{"type":"domInserted"}"#),
            Err(CaptureError::Json(_))
        ));
    }

    #[test]
    fn test_outbound_shape() {
        let reply = Outbound::Response {
            response: Response::Status(ScanStatus {
                is_scanning: false,
                mode: ScanMode::Idle,
                post_count: 0,
                elapsed_seconds: 0,
            }),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "response", "response": {
                "isScanning": false, "mode": "idle", "postCount": 0, "elapsedSeconds": 0
            }})
        );
        assert_eq!(
            serde_json::to_value(Outbound::Scroll { pixels: 420 }).unwrap(),
            json!({"type": "scroll", "pixels": 420})
        );
    }

    #[test]
    fn test_small_message_is_one_frame() {
        let frames = Outbound::Scroll { pixels: 420 }.encode().unwrap();
        assert_eq!(frames, vec![br#"{"type":"scroll","pixels":420}"#.to_vec()]);
    }

    #[test]
    fn test_oversized_export_is_chunked() {
        let reply = Outbound::Response {
            response: Response::Exported { success: true, data: large_export(400, 2800) },
        };
        assert!(serde_json::to_vec(&reply).unwrap().len() > MAX_FRAME_LEN);

        let frames = reply.encode().unwrap();
        assert!(frames.len() >= 3);
        assert!(frames.iter().all(|f| f.len() <= MAX_FRAME_LEN));

        let header: Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(header["type"], "exportHeader");
        assert_eq!(header["delivery"], "response");
        assert_eq!(header["chunks"], frames.len() - 1);
        assert_eq!(header["data"]["postsCount"], 400);
        assert_eq!(header["data"]["groupName"], "X");
        assert_eq!(header["data"]["posts"], json!([]));

        let mut ids = Vec::new();
        for (i, frame) in frames[1..].iter().enumerate() {
            let chunk: Value = serde_json::from_slice(frame).unwrap();
            assert_eq!(chunk["type"], "exportChunk");
            assert_eq!(chunk["index"], i);
            assert_eq!(chunk["total"], frames.len() - 1);
            for post in chunk["posts"].as_array().unwrap() {
                ids.push(post["postId"].as_str().unwrap().to_string());
            }
        }
        let expected: Vec<String> = (0..400).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);

        let mut stdout = Vec::new();
        for frame in &frames {
            crate::framing::write_frame(&mut stdout, frame).unwrap();
        }
        assert!(stdout.len() > MAX_FRAME_LEN);
    }

    #[test]
    fn test_oversized_scan_complete_is_chunked() {
        let data = large_export(400, 2800);
        let notice = Outbound::Notification {
            notification: Notification::ScanComplete { post_count: data.posts_count, data },
        };
        let frames = notice.encode().unwrap();
        let header: Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(header["delivery"], "scanComplete");
    }

    #[test]
    fn test_failure_shape() {
        let failure = Outbound::failure(&CaptureError::MessageTooLarge(2_000_000));
        assert_eq!(
            serde_json::to_value(failure).unwrap(),
            json!({"type": "failure", "success": false, "error": "Message too large: 2000000 bytes"})
        );
    }
}

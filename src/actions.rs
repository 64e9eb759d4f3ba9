//! User-initiated requests: synthetic data injection and the mission chat.
//!
//! Generation requests log a pending packet to the stream terminals before
//! the call and a confirmation after the file lands on disk, so the feeds
//! show the same feedback a user would see in the browser.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::{Endpoint, RequestBody, ResourceFetcher};
use crate::http_client::{HttpReply, MAX_UPLOAD_BYTES, TransportError, copy_limited};
use crate::log_stream::{Channel, LogStream, Packet};
use crate::model::ChatReplyWire;

/// Reply shown when the chat backend cannot be reached.
pub const CHAT_FAILURE: &str = "Connection Error: Uplink failed.";
pub const AI_FALLBACK_FILE: &str = "synth_ai_gen.json";

static FILENAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"filename[^;=\n]*=\s*(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#).ok()
});

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Please enter a command for the AI.")]
    EmptyPrompt,
    #[error("Chat message is empty")]
    EmptyMessage,
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Server rejected the request with HTTP {status}")]
    Server { status: u16 },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Context the generation actions need besides the fetcher.
pub struct ActionContext<'a, R: Rng + ?Sized> {
    pub stream: &'a mut LogStream,
    pub rng: &'a mut R,
    pub download_dir: &'a Path,
    pub now: OffsetDateTime,
}

/// A generated file written to the download directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Upload a JSON file as a synthetic event stream.
///
/// Returns the backend's receipt body.
pub fn upload_synthetic<F: ResourceFetcher>(
    fetcher: &F,
    path: &Path,
) -> Result<serde_json::Value, ActionError> {
    let boundary = format!("astrowatch-{}", Uuid::new_v4().simple());
    let bytes = multipart_body(path, &boundary)?;
    tracing::info!(path = %path.display(), "Uploading synthetic stream");
    let reply = fetcher.post(Endpoint::SyntheticUpload, RequestBody::Multipart { boundary, bytes })?;
    let reply = require_ok(reply)?;
    Ok(reply.json().unwrap_or(serde_json::Value::Null))
}

/// Ask the backend for a synthetic event file of `event_type`.
pub fn generate_synthetic<F, R>(
    fetcher: &F,
    event_type: &str,
    ctx: ActionContext<'_, R>,
) -> Result<Download, ActionError>
where
    F: ResourceFetcher,
    R: Rng + ?Sized,
{
    let ActionContext {
        stream,
        rng,
        download_dir,
        now,
    } = ctx;
    let request_channel = match event_type {
        "Supernova" => Some(Channel::Ztf),
        "Transit" => Some(Channel::Tess),
        _ => None,
    };
    if let Some(channel) = request_channel {
        let packet = Packet::System {
            id: format!("REQ-{}", rng.random_range(0..9999)),
            source: "SYNTH-GEN".into(),
            classification: format!("GENERATING {}...", event_type.to_uppercase()),
            status: "PENDING".into(),
        };
        stream.push_system(channel, packet, now);
    }

    let body = RequestBody::Json(json!({ "event_type": event_type }));
    let reply = require_ok(fetcher.post(Endpoint::SyntheticGenerate, body)?)?;
    let download = save_download(&reply, download_dir, &format!("synth_{event_type}.json"))?;

    let channel = if event_type == "Supernova" {
        Channel::Ztf
    } else {
        Channel::Tess
    };
    let packet = Packet::System {
        id: format!("DL-{}", rng.random_range(0..9999)),
        source: "SYSTEM".into(),
        classification: "FILE GENERATED".into(),
        status: "DOWNLOADED".into(),
    };
    stream.push_system(channel, packet, now);
    Ok(download)
}

/// Ask the AI generator for a synthetic file described by `prompt`.
pub fn generate_synthetic_ai<F, R>(
    fetcher: &F,
    prompt: &str,
    ctx: ActionContext<'_, R>,
) -> Result<Download, ActionError>
where
    F: ResourceFetcher,
    R: Rng + ?Sized,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ActionError::EmptyPrompt);
    }
    let ActionContext {
        stream,
        rng,
        download_dir,
        now,
    } = ctx;
    let packet = Packet::System {
        id: format!("AI-REQ-{}", rng.random_range(0..9999)),
        source: "COSMIC-ORACLE".into(),
        classification: "ANALYZING PROMPT...".into(),
        status: "PROCESSING".into(),
    };
    stream.push_system(Channel::Ztf, packet, now);

    let body = RequestBody::Json(json!({ "prompt": prompt }));
    let reply = require_ok(fetcher.post(Endpoint::SyntheticGenerateAi, body)?)?;
    let download = save_download(&reply, download_dir, AI_FALLBACK_FILE)?;

    let packet = Packet::System {
        id: format!("AI-DL-{}", rng.random_range(0..9999)),
        source: "SYSTEM".into(),
        classification: "AI FILE GENERATED".into(),
        status: "DOWNLOADED".into(),
    };
    stream.push_system(Channel::Ztf, packet, now);
    Ok(download)
}

/// Presentation of a chat reply, chosen by its leading tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStyle {
    Mission,
    General,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub style: ChatStyle,
}

/// Send a chat message. Backend failures become the uplink error reply.
pub fn chat<F: ResourceFetcher>(fetcher: &F, message: &str) -> Result<ChatReply, ActionError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ActionError::EmptyMessage);
    }
    let body = RequestBody::Json(json!({ "message": message }));
    let reply = fetcher
        .post(Endpoint::Chat, body)
        .map_err(|err| err.to_string())
        .and_then(|reply| {
            let reply = require_ok(reply).map_err(|err| err.to_string())?;
            reply
                .json::<ChatReplyWire>()
                .map_err(|err| err.to_string())
        });
    Ok(match reply {
        Ok(wire) => parse_chat_reply(&wire.response),
        Err(reason) => {
            tracing::error!("Chat request failed: {reason}");
            ChatReply {
                text: CHAT_FAILURE.to_string(),
                style: ChatStyle::Plain,
            }
        }
    })
}

/// Strip a leading `[MISSION]` or `[GENERAL]` tag and pick the style.
pub fn parse_chat_reply(raw: &str) -> ChatReply {
    for (tag, style) in [("[MISSION]", ChatStyle::Mission), ("[GENERAL]", ChatStyle::General)] {
        if let Some(rest) = raw.strip_prefix(tag) {
            return ChatReply {
                text: rest.trim().to_string(),
                style,
            };
        }
    }
    ChatReply {
        text: raw.to_string(),
        style: ChatStyle::Plain,
    }
}

/// Filename announced by an `attachment` Content-Disposition header.
pub fn attachment_filename(disposition: &str) -> Option<String> {
    if !disposition.contains("attachment") {
        return None;
    }
    let captures = FILENAME_PATTERN.as_ref()?.captures(disposition)?;
    let raw = (1..=3).find_map(|group| captures.get(group))?.as_str();
    let cleaned: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Reduce a server-chosen name to a single safe path component.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_control() || matches!(c, ':' | '*' | '?' | '<' | '>' | '|') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

fn require_ok(reply: HttpReply) -> Result<HttpReply, ActionError> {
    if reply.is_ok() {
        Ok(reply)
    } else {
        tracing::error!(status = reply.status, "Request failed");
        Err(ActionError::Server {
            status: reply.status,
        })
    }
}

fn save_download(reply: &HttpReply, dir: &Path, fallback: &str) -> Result<Download, ActionError> {
    let name = reply
        .content_disposition
        .as_deref()
        .and_then(attachment_filename)
        .unwrap_or_else(|| fallback.to_string());
    let path = dir.join(sanitize_filename(&name, fallback));
    let write_error = |source| ActionError::WriteFile {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(write_error)?;
    let mut file = File::create(&path).map_err(write_error)?;
    file.write_all(&reply.body).map_err(write_error)?;
    tracing::info!(path = %path.display(), bytes = reply.body.len(), "Synthetic data downloaded");
    Ok(Download {
        bytes: reply.body.len() as u64,
        path,
    })
}

fn multipart_body(path: &Path, boundary: &str) -> Result<Vec<u8>, ActionError> {
    let read_error = |source| ActionError::ReadFile {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().replace('"', "_"))
        .unwrap_or_else(|| "upload.json".to_string());
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/json\r\n\r\n"
    )
    .into_bytes();
    copy_limited(file, &mut body, MAX_UPLOAD_BYTES).map_err(read_error)?;
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;
    use tempfile::tempdir;

    type Sent = (Endpoint, RequestBody);

    struct ScriptedBackend {
        reply: Mutex<Option<crate::api::FetchResult>>,
        sent: Mutex<Vec<Sent>>,
    }

    impl ScriptedBackend {
        fn replying(reply: crate::api::FetchResult) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ResourceFetcher for ScriptedBackend {
        fn get(&self, _endpoint: Endpoint) -> crate::api::FetchResult {
            Ok(HttpReply::with_status(404, ""))
        }

        fn post(&self, endpoint: Endpoint, body: RequestBody) -> crate::api::FetchResult {
            self.sent.lock().unwrap().push((endpoint, body));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(HttpReply::with_status(500, "")))
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn attachment(name: &str, body: &str) -> crate::api::FetchResult {
        let mut reply = HttpReply::ok(body);
        reply.content_disposition = Some(format!("attachment; filename=\"{name}\""));
        Ok(reply)
    }

    fn system_statuses(stream: &LogStream, channel: Channel) -> Vec<String> {
        stream
            .entries(channel)
            .iter()
            .filter_map(|entry| match &entry.packet {
                Packet::System { status, .. } => Some(status.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn extracts_attachment_filenames() {
        assert_eq!(
            attachment_filename("attachment; filename=\"synth_nova.json\"").as_deref(),
            Some("synth_nova.json")
        );
        assert_eq!(
            attachment_filename("attachment; filename='quoted.json'; size=3").as_deref(),
            Some("quoted.json")
        );
        assert_eq!(
            attachment_filename("attachment; filename=plain.json; size=3").as_deref(),
            Some("plain.json")
        );
        assert_eq!(attachment_filename("inline; filename=\"x.json\""), None);
        assert_eq!(attachment_filename("attachment"), None);
    }

    #[test]
    fn sanitizes_to_single_component() {
        assert_eq!(sanitize_filename("../../etc/passwd", "f.json"), "passwd");
        assert_eq!(sanitize_filename("C:\\temp\\a:b.json", "f.json"), "a_b.json");
        assert_eq!(sanitize_filename("..", "f.json"), "f.json");
    }

    #[test]
    fn chat_tags_select_style() {
        assert_eq!(
            parse_chat_reply("[MISSION]  Orbit nominal "),
            ChatReply {
                text: "Orbit nominal".into(),
                style: ChatStyle::Mission
            }
        );
        assert_eq!(parse_chat_reply("[GENERAL]Hello").style, ChatStyle::General);
        assert_eq!(parse_chat_reply("plain reply").style, ChatStyle::Plain);
    }

    #[test]
    fn chat_failure_becomes_uplink_error() {
        let backend = ScriptedBackend::replying(Err(TransportError::Transport("down".into())));
        let reply = chat(&backend, "status?").unwrap();
        assert_eq!(reply.text, CHAT_FAILURE);
        assert!(matches!(chat(&backend, "  "), Err(ActionError::EmptyMessage)));
    }

    #[test]
    fn chat_posts_message() {
        let backend = ScriptedBackend::replying(Ok(HttpReply::ok(r#"{"response":"[MISSION] Go"}"#)));
        let reply = chat(&backend, " launch ").unwrap();
        assert_eq!(reply.text, "Go");
        match &backend.sent()[0] {
            (Endpoint::Chat, RequestBody::Json(body)) => assert_eq!(body["message"], "launch"),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn generate_writes_file_and_logs_feedback() {
        let dir = tempdir().unwrap();
        let backend = ScriptedBackend::replying(attachment("../nova.json", "{\"n\":1}"));
        let mut stream = LogStream::default();
        let mut rng = StdRng::seed_from_u64(1);
        let download = generate_synthetic(
            &backend,
            "Supernova",
            ActionContext {
                stream: &mut stream,
                rng: &mut rng,
                download_dir: dir.path(),
                now: now(),
            },
        )
        .unwrap();
        assert_eq!(download.path, dir.path().join("nova.json"));
        assert_eq!(std::fs::read_to_string(&download.path).unwrap(), "{\"n\":1}");
        assert_eq!(system_statuses(&stream, Channel::Ztf), ["PENDING", "DOWNLOADED"]);
        assert!(stream.entries(Channel::Tess).is_empty());
    }

    #[test]
    fn generate_falls_back_to_type_filename() {
        let dir = tempdir().unwrap();
        let backend = ScriptedBackend::replying(Ok(HttpReply::ok("[]")));
        let mut stream = LogStream::default();
        let mut rng = StdRng::seed_from_u64(2);
        let download = generate_synthetic(
            &backend,
            "Pulsar",
            ActionContext {
                stream: &mut stream,
                rng: &mut rng,
                download_dir: dir.path(),
                now: now(),
            },
        )
        .unwrap();
        assert_eq!(download.path, dir.path().join("synth_Pulsar.json"));
        // no request packet for untracked types; confirmation goes to TESS
        assert_eq!(system_statuses(&stream, Channel::Tess), ["DOWNLOADED"]);
    }

    #[test]
    fn generate_ai_validates_and_reports_server_errors() {
        let dir = tempdir().unwrap();
        let backend = ScriptedBackend::replying(Ok(HttpReply::with_status(502, "")));
        let mut stream = LogStream::default();
        let mut rng = StdRng::seed_from_u64(3);
        let empty = generate_synthetic_ai(
            &backend,
            "   ",
            ActionContext {
                stream: &mut stream,
                rng: &mut rng,
                download_dir: dir.path(),
                now: now(),
            },
        );
        assert!(matches!(empty, Err(ActionError::EmptyPrompt)));
        assert!(backend.sent().is_empty());

        let failed = generate_synthetic_ai(
            &backend,
            "a bright kilonova",
            ActionContext {
                stream: &mut stream,
                rng: &mut rng,
                download_dir: dir.path(),
                now: now(),
            },
        );
        assert!(matches!(failed, Err(ActionError::Server { status: 502 })));
        assert_eq!(system_statuses(&stream, Channel::Ztf), ["PROCESSING"]);
    }

    #[test]
    fn upload_sends_multipart_file_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "[{\"event\":\"X\"}]").unwrap();
        let backend = ScriptedBackend::replying(Ok(HttpReply::ok(r#"{"status":"ok"}"#)));
        let receipt = upload_synthetic(&backend, &path).unwrap();
        assert_eq!(receipt["status"], "ok");
        let (endpoint, body) = backend.sent().remove(0);
        assert_eq!(endpoint, Endpoint::SyntheticUpload);
        let RequestBody::Multipart { boundary, bytes } = body else {
            panic!("expected multipart body");
        };
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"file\"; filename=\"events.json\""));
        assert!(text.contains("[{\"event\":\"X\"}]"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn upload_of_missing_file_fails_locally() {
        let backend = ScriptedBackend::replying(Ok(HttpReply::ok("{}")));
        let err = upload_synthetic(&backend, Path::new("/nonexistent/events.json")).unwrap_err();
        assert!(matches!(err, ActionError::ReadFile { .. }));
        assert!(backend.sent().is_empty());
    }
}

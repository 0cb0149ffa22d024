//! Manual exchange of descriptions between the two operators.
//!
//! The finalized local description is printed as one line of text; the
//! peer's description is pasted back. Parsing pasted text is the only place
//! external data enters the process.

use crate::error::SessionError;
use crate::peer::types::{ConnectionDescription, Role};
use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};
use tokio::sync::mpsc::Receiver;

/// Decompressed size cap for compact blobs (zip-bomb guard)
const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024;

/// How a description is rendered for copy-paste
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeFormat {
    /// Single-line JSON, readable by browser peers.
    #[default]
    Json,
    /// base64(gzip(JSON)).
    Compact,
}

pub fn encode_description(
    desc: &ConnectionDescription,
    format: ExchangeFormat,
) -> Result<String, SessionError> {
    let json = serde_json::to_string(desc)
        .map_err(|e| SessionError::connection("failed to encode description", e))?;
    match format {
        ExchangeFormat::Json => Ok(json),
        ExchangeFormat::Compact => {
            let mut gz = GzEncoder::new(Vec::new(), Compression::best());
            gz.write_all(json.as_bytes())?;
            let compressed = gz.finish()?;
            Ok(general_purpose::STANDARD.encode(compressed))
        }
    }
}

/// Parse pasted text in either exchange format.
pub fn parse_description(text: &str) -> Result<ConnectionDescription, SessionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SessionError::MalformedInput("nothing was pasted".into()));
    }

    let desc: ConnectionDescription = if text.starts_with('{') {
        serde_json::from_str(text)
            .map_err(|e| SessionError::MalformedInput(format!("not a session description: {e}")))?
    } else {
        decode_compact(text)?
    };

    if desc.sdp.trim().is_empty() {
        return Err(SessionError::MalformedInput("description has an empty sdp".into()));
    }
    Ok(desc)
}

fn decode_compact(text: &str) -> Result<ConnectionDescription, SessionError> {
    let compressed = general_purpose::STANDARD
        .decode(text)
        .map_err(|e| SessionError::MalformedInput(format!("neither JSON nor base64: {e}")))?;

    let mut json = Vec::new();
    GzDecoder::new(&compressed[..])
        .take(MAX_DECOMPRESSED_SIZE)
        .read_to_end(&mut json)
        .map_err(|e| SessionError::MalformedInput(format!("corrupt compact description: {e}")))?;

    serde_json::from_slice(&json)
        .map_err(|e| SessionError::MalformedInput(format!("not a session description: {e}")))
}

/// Show the finalized local description to the operator.
pub fn present_local_description(role: Role, blob: &str) {
    match role {
        Role::Initiator => {
            println!("Your offer is:");
            println!("{blob}");
        }
        Role::Responder => {
            println!("\n\nHere is your answer:");
            println!("{blob}\n\n");
        }
    }
}

/// Prompt for and read the peer's description. Blank lines are skipped.
pub async fn read_pasted(role: Role, lines: &mut Receiver<String>) -> Result<String, SessionError> {
    match role {
        Role::Initiator => println!("Please paste your answer:"),
        Role::Responder => println!("Please paste your offer:"),
    }
    while let Some(line) = lines.recv().await {
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
    Err(SessionError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "standard input closed before a description was pasted",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::SdpKind;

    const BROWSER_OFFER: &str = r#"{"type":"offer","sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\n"}"#;

    #[test]
    fn parses_browser_json() {
        let desc = parse_description(BROWSER_OFFER).unwrap();
        assert_eq!(desc.kind, SdpKind::Offer);
        assert!(desc.sdp.starts_with("v=0\r\n"));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let desc = parse_description(&format!("  {BROWSER_OFFER}\n")).unwrap();
        assert_eq!(desc.kind, SdpKind::Offer);
    }

    #[test]
    fn json_output_is_one_line() {
        let desc = ConnectionDescription::new(SdpKind::Answer, "v=0\r\na=candidate:1\r\n");
        let blob = encode_description(&desc, ExchangeFormat::Json).unwrap();
        assert!(!blob.contains('\n'));
        assert_eq!(parse_description(&blob).unwrap(), desc);
    }

    #[test]
    fn compact_blob_is_accepted() {
        let desc = ConnectionDescription::new(SdpKind::Offer, "v=0\r\n".repeat(50));
        let blob = encode_description(&desc, ExchangeFormat::Compact).unwrap();
        assert!(!blob.starts_with('{'));
        assert!(blob.len() < serde_json::to_string(&desc).unwrap().len());
        assert_eq!(parse_description(&blob).unwrap(), desc);
    }

    #[test]
    fn garbage_is_malformed() {
        for text in ["", "hello there", "{not json", r#"{"type":"offer"}"#, r#"{"type":"rollback","sdp":"v=0"}"#] {
            let err = parse_description(text).unwrap_err();
            assert!(err.is_malformed_input(), "{text:?} gave {err}");
        }
    }

    #[test]
    fn empty_sdp_is_malformed() {
        assert!(parse_description(r#"{"type":"answer","sdp":"  "}"#)
            .unwrap_err()
            .is_malformed_input());
    }

    #[tokio::test]
    async fn read_pasted_skips_blank_lines() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        tx.send(String::new()).await.unwrap();
        tx.send(BROWSER_OFFER.to_string()).await.unwrap();
        let line = read_pasted(Role::Responder, &mut rx).await.unwrap();
        assert_eq!(line, BROWSER_OFFER);
    }

    #[tokio::test]
    async fn read_pasted_reports_eof() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(1);
        drop(tx);
        assert!(matches!(
            read_pasted(Role::Initiator, &mut rx).await,
            Err(SessionError::Io(_))
        ));
    }
}

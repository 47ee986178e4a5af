use std::time::Instant;

use bytes::Bytes;
use seqlink_engine::Transceiver;
use seqlink_frame::SeqFactory;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, transceiver_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_body, BodyKind, OutputFormat, Printed};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let body = resolve_body(&args)?;

    let stream = args
        .endpoint
        .connect()
        .await
        .map_err(|err| transport_error("connect failed", err))?;

    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let _pushes = transceiver.listen();

    let started = Instant::now();
    let reply = transceiver
        .send_with_timeout(body, timeout)
        .await
        .map_err(|err| transceiver_error("send failed", err))?;

    let endpoint = args.endpoint.to_string();
    print_body(
        &Printed {
            kind: BodyKind::Reply,
            endpoint: &endpoint,
            body: &reply,
            elapsed_ms: Some(started.elapsed().as_millis()),
        },
        format,
    );

    Ok(SUCCESS)
}

fn resolve_body(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(text) = &args.hex {
        return decode_hex(text);
    }
    if let Some(data) = &args.data {
        return Ok(Bytes::from(data.clone().into_bytes()));
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map(Bytes::from)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Bytes::new())
}

/// Accepts `0a0b`, `0x0a0b` and whitespace-separated byte pairs.
fn decode_hex(text: &str) -> CliResult<Bytes> {
    let compact: String = text
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(&compact)
        .map(Bytes::from)
        .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            endpoint: "127.0.0.1:7000".parse().unwrap(),
            hex: None,
            data: None,
            file: None,
            timeout: "2s".to_string(),
        }
    }

    #[test]
    fn hex_body_variants() {
        assert_eq!(decode_hex("0a0b").unwrap().as_ref(), &[0x0a, 0x0b]);
        assert_eq!(decode_hex("0xFF00").unwrap().as_ref(), &[0xff, 0x00]);
        assert_eq!(decode_hex("de ad be ef").unwrap().as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn bad_hex_is_usage_error() {
        assert_eq!(decode_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(decode_hex("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn body_defaults_to_empty() {
        assert!(resolve_body(&args()).unwrap().is_empty());
    }

    #[test]
    fn data_body_is_utf8_bytes() {
        let args = SendArgs {
            data: Some("ping".to_string()),
            ..args()
        };
        assert_eq!(resolve_body(&args).unwrap().as_ref(), b"ping");
    }

    #[test]
    fn missing_file_is_reported() {
        let args = SendArgs {
            file: Some(PathBuf::from("/nonexistent/seqlink-body.bin")),
            ..args()
        };
        let err = resolve_body(&args).unwrap_err();
        assert!(err.message.contains("failed reading"));
    }
}

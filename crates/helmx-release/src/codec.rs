//! Release codec: protobuf, gzip, base64
//!
//! This is the encoding Helm's ConfigMap and Secret storage drivers use for the `release`
//! entry. Decoding accepts uncompressed payloads too, as older Tiller versions wrote them.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use prost::Message;

use crate::error::{ReleaseError, Result};
use crate::proto::Release;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b, 0x08];

/// Gzip at best compression
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| ReleaseError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ReleaseError::Compression(e.to_string()))
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ReleaseError::Compression(e.to_string()))?;
    Ok(decompressed)
}

/// Encode a release for storage: `base64(gzip(protobuf(release)))`
pub fn encode_release(release: &Release) -> Result<String> {
    let compressed = compress(&release.encode_to_vec())?;
    Ok(STANDARD.encode(compressed))
}

/// Decode the `release` entry of a storage object
pub fn decode_release(data: &str) -> Result<Release> {
    let decoded = STANDARD.decode(data.trim())?;
    let bytes = if decoded.starts_with(GZIP_MAGIC) {
        decompress(&decoded)?
    } else {
        decoded
    };
    Ok(Release::decode(bytes.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Info, Status, StatusCode};

    fn sample() -> Release {
        Release {
            name: "web".to_string(),
            namespace: "prod".to_string(),
            version: 2,
            manifest: "\n---\n# Source: web/templates/svc.yaml\nkind: Service\n".to_string(),
            info: Some(Info {
                status: Some(Status {
                    code: StatusCode::Deployed as i32,
                    notes: String::new(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_is_gzipped_base64() {
        let encoded = encode_release(&sample()).unwrap();
        let raw = STANDARD.decode(&encoded).unwrap();
        assert!(raw.starts_with(GZIP_MAGIC));
        assert_eq!(decode_release(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_decode_uncompressed_payload() {
        let encoded = STANDARD.encode(sample().encode_to_vec());
        assert_eq!(decode_release(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_release("not base64!"),
            Err(ReleaseError::Base64(_))
        ));
        let truncated = STANDARD.encode([0x1f, 0x8b, 0x08, 0x00]);
        assert!(matches!(
            decode_release(&truncated),
            Err(ReleaseError::Compression(_))
        ));
    }
}

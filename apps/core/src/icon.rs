use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const IHDR_END: usize = 24;

/// 1x1 transparent PNG stored for apps whose icon is missing or not a PNG.
pub const PLACEHOLDER_PNG: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IconError {
    #[error("icon blob is empty")]
    Empty,
    #[error("icon blob is not a PNG image")]
    NotPng,
    #[error("icon blob is truncated ({0} bytes)")]
    Truncated(usize),
    #[error("icon has zero width or height")]
    ZeroSize,
}

/// Reads the pixel dimensions from a PNG header.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), IconError> {
    if bytes.is_empty() {
        return Err(IconError::Empty);
    }
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Err(IconError::NotPng);
    }
    if bytes.len() < IHDR_END {
        return Err(IconError::Truncated(bytes.len()));
    }
    if &bytes[12..16] != b"IHDR" {
        return Err(IconError::NotPng);
    }

    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        return Err(IconError::ZeroSize);
    }
    Ok((width, height))
}

/// Converts an inventory icon into the blob written to the cache.
pub fn normalize(bytes: &[u8]) -> Vec<u8> {
    match decode_dimensions(bytes) {
        Ok(_) => bytes.to_vec(),
        Err(_) => PLACEHOLDER_PNG.to_vec(),
    }
}

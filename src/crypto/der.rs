//! Minimal DER codec for the two structures push signing needs: ECDSA
//! signatures (`SEQUENCE { INTEGER r, INTEGER s }`) and SEC1 EC private keys.

use base64::{STANDARD, encode_config};

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_0: u8 = 0xa0;
const TAG_CONTEXT_1: u8 = 0xa1;

/// prime256v1 / secp256r1
const OID_PRIME256V1: [u8; 8] = [0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];

pub const SCALAR_LEN: usize = 32;
pub const RAW_SIGNATURE_LEN: usize = 2 * SCALAR_LEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerError {
    #[error("unexpected tag 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("input truncated")]
    Truncated,
    #[error("unsupported length encoding")]
    InvalidLength,
    #[error("integer does not fit in {SCALAR_LEN} bytes")]
    IntegerTooLarge,
    #[error("trailing bytes after signature")]
    TrailingBytes,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, DerError> {
        let byte = *self.bytes.get(self.pos).ok_or(DerError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DerError> {
        let end = self.pos.checked_add(len).ok_or(DerError::InvalidLength)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DerError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn length(&mut self) -> Result<usize, DerError> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        match first {
            0x81 => {
                let len = self.byte()? as usize;
                if len < 0x80 {
                    return Err(DerError::InvalidLength);
                }
                Ok(len)
            }
            0x82 => {
                let high = self.byte()? as usize;
                let low = self.byte()? as usize;
                Ok((high << 8) | low)
            }
            _ => Err(DerError::InvalidLength),
        }
    }

    fn element(&mut self, expected: u8) -> Result<&'a [u8], DerError> {
        let found = self.byte()?;
        if found != expected {
            return Err(DerError::UnexpectedTag { expected, found });
        }
        let len = self.length()?;
        self.take(len)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

/// Converts a DER ECDSA signature into the fixed-width `r || s` form JWS uses.
pub fn signature_to_raw(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN], DerError> {
    let mut outer = Reader::new(der);
    let body = outer.element(TAG_SEQUENCE)?;
    if !outer.is_empty() {
        return Err(DerError::TrailingBytes);
    }

    let mut inner = Reader::new(body);
    let r = inner.element(TAG_INTEGER)?;
    let s = inner.element(TAG_INTEGER)?;
    if !inner.is_empty() {
        return Err(DerError::TrailingBytes);
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    copy_scalar(r, &mut raw[..SCALAR_LEN])?;
    copy_scalar(s, &mut raw[SCALAR_LEN..])?;
    Ok(raw)
}

fn copy_scalar(integer: &[u8], out: &mut [u8]) -> Result<(), DerError> {
    let start = integer
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(integer.len());
    let trimmed = &integer[start..];
    if trimmed.len() > out.len() {
        return Err(DerError::IntegerTooLarge);
    }
    let offset = out.len() - trimmed.len();
    out[..offset].fill(0);
    out[offset..].copy_from_slice(trimmed);
    Ok(())
}

pub fn raw_to_signature(raw: &[u8; RAW_SIGNATURE_LEN]) -> Vec<u8> {
    let mut body = Vec::with_capacity(RAW_SIGNATURE_LEN + 6);
    push_integer(&mut body, &raw[..SCALAR_LEN]);
    push_integer(&mut body, &raw[SCALAR_LEN..]);
    let mut der = Vec::with_capacity(body.len() + 3);
    push_element(&mut der, TAG_SEQUENCE, &body);
    der
}

fn push_integer(out: &mut Vec<u8>, unsigned: &[u8]) {
    let start = unsigned
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(unsigned.len().saturating_sub(1));
    let trimmed = &unsigned[start..];
    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.first().is_some_and(|byte| byte & 0x80 != 0) {
        content.push(0);
    }
    content.extend_from_slice(trimmed);
    push_element(out, TAG_INTEGER, &content);
}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
}

fn push_element(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    push_length(out, content.len());
    out.extend_from_slice(content);
}

/// SEC1 `ECPrivateKey` (RFC 5915) for a P-256 scalar and its public point.
pub fn encode_ec_private_key(scalar: &[u8; SCALAR_LEN], public_raw: &[u8; 65]) -> Vec<u8> {
    let mut body = Vec::with_capacity(119);
    push_element(&mut body, TAG_INTEGER, &[1]);
    push_element(&mut body, TAG_OCTET_STRING, scalar);

    let mut oid = Vec::with_capacity(OID_PRIME256V1.len() + 2);
    push_element(&mut oid, TAG_OID, &OID_PRIME256V1);
    push_element(&mut body, TAG_CONTEXT_0, &oid);

    let mut bits = Vec::with_capacity(public_raw.len() + 1);
    bits.push(0);
    bits.extend_from_slice(public_raw);
    let mut public = Vec::with_capacity(bits.len() + 2);
    push_element(&mut public, TAG_BIT_STRING, &bits);
    push_element(&mut body, TAG_CONTEXT_1, &public);

    let mut der = Vec::with_capacity(body.len() + 2);
    push_element(&mut der, TAG_SEQUENCE, &body);
    der
}

pub fn ec_private_key_pem(scalar: &[u8; SCALAR_LEN], public_raw: &[u8; 65]) -> String {
    pem_encode("EC PRIVATE KEY", &encode_ec_private_key(scalar, public_raw))
}

fn pem_encode(label: &str, der: &[u8]) -> String {
    let encoded = encode_config(der, STANDARD);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

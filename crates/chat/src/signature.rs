use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Header Meta signs webhook deliveries with.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies a raw webhook body against its `X-Hub-Signature-256` value.
/// Missing prefix, undecodable hex, and mismatched digests all verify
/// false; the digest comparison itself is constant-time.
pub fn verify_signature(app_secret: &SecretString, body: &[u8], header_value: &str) -> bool {
    let Some(hex_signature) = header_value.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Some(signature) = decode_hex(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Produces the header value the transport would sign this body with.
/// Webhook tests use it to fabricate valid deliveries.
pub fn sign_payload(app_secret: &SecretString, body: &[u8]) -> String {
    let digest = match HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            encode_hex(mac.finalize().into_bytes().as_slice())
        }
        Err(_) => encode_hex(Sha256::digest(body).as_slice()),
    };
    format!("{SIGNATURE_PREFIX}{digest}")
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&hex[index..index + 2], 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

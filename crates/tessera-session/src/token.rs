//! Session token generation.

use rand::RngCore;

/// Generate a random lowercase-hex token of exactly `len` characters.
pub fn generate_token(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::rng().fill_bytes(&mut bytes);
    let mut token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    token.truncate(len);
    token
}

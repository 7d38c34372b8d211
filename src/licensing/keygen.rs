use rand::RngCore;
use rand::rngs::OsRng;

/// Generate a license key shaped `PREFIX-XXXXXXXX-XXXXXXXX`.
///
/// Each block is 4 bytes from the OS CSPRNG as uppercase hex, 64 bits total.
/// Keys are the uniqueness handle of the license store, so collisions must be
/// negligible; `create_license` still rejects the rare duplicate.
pub fn generate_key(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!(
        "{}-{}-{}",
        prefix,
        hex::encode_upper(&bytes[..4]),
        hex::encode_upper(&bytes[4..])
    )
}

/// Whether `key` has the generated shape for `prefix`.
pub fn is_valid_key_format(key: &str, prefix: &str) -> bool {
    let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    let mut blocks = rest.split('-');
    let is_block = |b: Option<&str>| {
        b.is_some_and(|b| {
            b.len() == 8 && b.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
    };
    is_block(blocks.next()) && is_block(blocks.next()) && blocks.next().is_none()
}

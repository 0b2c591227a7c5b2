//! Fixed-width binary codec
//!
//! All integers on disk are 4-byte big-endian. Block pointers use
//! [`NO_ADDRESS`] as the "none" marker, and names occupy a fixed
//! [`NAME_LEN`]-byte ASCII field, zero padded.

use crate::error::{ContainerError, Result};

/// On-disk marker for an absent block pointer
pub const NO_ADDRESS: u32 = u32::MAX;

/// Width of every name field (metadata blocks and inode records)
pub const NAME_LEN: usize = 256;

/// Write a big-endian u32 at `offset`
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian u32 at `offset`
pub fn get_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let raw = bytes.get(offset..offset + 4).ok_or_else(|| {
        ContainerError::InvalidFormat(format!(
            "truncated integer at offset {} (buffer is {} bytes)",
            offset,
            bytes.len()
        ))
    })?;
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Write an optional block pointer
pub fn put_link(buf: &mut [u8], offset: usize, link: Option<u32>) {
    put_u32(buf, offset, link.unwrap_or(NO_ADDRESS));
}

/// Read an optional block pointer
pub fn get_link(bytes: &[u8], offset: usize) -> Result<Option<u32>> {
    match get_u32(bytes, offset)? {
        NO_ADDRESS => Ok(None),
        block => Ok(Some(block)),
    }
}

pub fn put_bool(buf: &mut [u8], offset: usize, value: bool) {
    buf[offset] = u8::from(value);
}

pub fn get_bool(bytes: &[u8], offset: usize) -> Result<bool> {
    bytes
        .get(offset)
        .map(|&b| b != 0)
        .ok_or_else(|| ContainerError::InvalidFormat(format!("truncated flag at offset {}", offset)))
}

/// Check that `name` can be stored in a name field and used as a path component
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ContainerError::InvalidArgument(
            "name cannot be empty".to_string(),
        ));
    }

    if name.len() > NAME_LEN {
        return Err(ContainerError::InvalidArgument(format!(
            "name '{}' is {} bytes (max {})",
            name,
            name.len(),
            NAME_LEN
        )));
    }

    if !name.is_ascii() {
        return Err(ContainerError::InvalidArgument(format!(
            "name '{}' must be ASCII",
            name
        )));
    }

    if name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(ContainerError::InvalidArgument(format!(
            "name '{}' contains a path delimiter or NUL",
            name
        )));
    }

    Ok(())
}

/// Write `name` into the fixed name field at `offset`, zero padded
///
/// The caller validates the name; anything past [`NAME_LEN`] is dropped.
pub fn put_name(buf: &mut [u8], offset: usize, name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    buf[offset..offset + len].copy_from_slice(&bytes[..len]);
    buf[offset + len..offset + NAME_LEN].fill(0);
}

/// Read the fixed name field at `offset`, stopping at the first zero byte
pub fn get_name(bytes: &[u8], offset: usize) -> Result<String> {
    let field = bytes.get(offset..offset + NAME_LEN).ok_or_else(|| {
        ContainerError::InvalidFormat(format!("truncated name field at offset {}", offset))
    })?;

    let len = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    let name = &field[..len];

    if !name.is_ascii() {
        return Err(ContainerError::InvalidFormat(
            "name field contains non-ASCII bytes".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(name).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_is_big_endian() {
        let mut buf = [0u8; 4];
        put_u32(&mut buf, 0, 0x0102_0304);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(get_u32(&buf, 0).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_truncated_u32() {
        let buf = [0u8; 3];
        assert!(matches!(
            get_u32(&buf, 0),
            Err(ContainerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_link_none_marker() {
        let mut buf = [0u8; 8];
        put_link(&mut buf, 0, None);
        put_link(&mut buf, 4, Some(7));

        assert_eq!(&buf[..4], &[0xFF; 4]);
        assert_eq!(get_link(&buf, 0).unwrap(), None);
        assert_eq!(get_link(&buf, 4).unwrap(), Some(7));
    }

    #[test]
    fn test_name_field_padding() {
        let mut buf = vec![0xAAu8; NAME_LEN + 4];
        put_name(&mut buf, 0, "docs");

        assert_eq!(&buf[..4], b"docs");
        assert!(buf[4..NAME_LEN].iter().all(|&b| b == 0));
        assert_eq!(buf[NAME_LEN], 0xAA); // untouched past the field
        assert_eq!(get_name(&buf, 0).unwrap(), "docs");
    }

    #[test]
    fn test_max_length_name() {
        let name = "n".repeat(NAME_LEN);
        assert!(validate_name(&name).is_ok());

        let mut buf = vec![0u8; NAME_LEN];
        put_name(&mut buf, 0, &name);
        assert_eq!(get_name(&buf, 0).unwrap(), name);
    }

    #[test]
    fn test_validate_name_rejects() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"n".repeat(NAME_LEN + 1)).is_err());
        assert!(validate_name("caf\u{e9}").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("ok-name.txt").is_ok());
    }
}

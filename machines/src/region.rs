//! Loading raw ROM region bytes into board memory.

/// Copy `data` into `dst` at `offset`, truncating what does not fit.
pub fn copy_into(name: &str, dst: &mut [u8], offset: usize, data: &[u8]) {
    let start = offset.min(dst.len());
    let len = data.len().min(dst.len() - start);
    if len < data.len() {
        log::warn!(
            "{name}: {} of {} bytes at {offset:#x} do not fit the {:#x}-byte region",
            data.len() - len,
            data.len(),
            dst.len()
        );
    }
    dst[start..start + len].copy_from_slice(&data[..len]);
}

/// V30 program ROM: little-endian words.
pub fn words_le(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|c| c[0] as u16 | (c.get(1).copied().unwrap_or(0) as u16) << 8)
        .collect()
}

/// 68000 program ROM: big-endian words.
pub fn words_be(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|c| (c[0] as u16) << 8 | c.get(1).copied().unwrap_or(0) as u16)
        .collect()
}

/// Element `index` of an image whose address decode ignores bits above
/// its (power-of-two rounded) size.
pub fn mirrored<T: Copy + Default>(words: &[T], index: usize) -> T {
    if words.is_empty() {
        return T::default();
    }
    let mask = words.len().next_power_of_two() - 1;
    words.get(index & mask).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_order_follows_the_cpu() {
        assert_eq!(words_le(&[0x34, 0x12]), vec![0x1234]);
        assert_eq!(words_be(&[0x12, 0x34, 0x56]), vec![0x1234, 0x5600]);
    }

    #[test]
    fn oversized_data_is_truncated() {
        let mut dst = [0u8; 4];
        copy_into("test", &mut dst, 2, &[1, 2, 3]);
        assert_eq!(dst, [0, 0, 1, 2]);
    }
}

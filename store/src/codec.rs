/// Encodes a vector as little-endian 32-bit floats, the on-disk format for
/// the `embeddings.vec` BLOB column.
pub fn encode_vec(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decodes a little-endian 32-bit float BLOB back into a vector.
pub fn decode_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let v = vec![1.0_f32, -2.5, 0.0, f32::MIN_POSITIVE];
        assert_eq!(decode_vec(&encode_vec(&v)), v);
    }
}

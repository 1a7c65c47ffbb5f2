//! BGRA to on-wire RGBA transform with vertical flip

use bytes::Bytes;

use crate::error::SendError;

pub const BYTES_PER_PIXEL: usize = 4;

/// Transform a top-down BGRA bitmap into the bottom-up RGBA layout the
/// consumer expects.
///
/// Pure function over its inputs: the result is a fresh buffer of the same
/// length, so this can run on any worker thread before the write lock is
/// taken. Rejects a bitmap whose length does not match `width * height * 4`
/// before touching anything.
pub fn encode(src: &[u8], width: u32, height: u32) -> Result<Bytes, SendError> {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    if src.len() != expected {
        return Err(SendError::InvalidInput {
            width,
            height,
            expected,
            actual: src.len(),
        });
    }

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let mut out = vec![0u8; expected];

    for (row, src_row) in src.chunks_exact(row_bytes).enumerate() {
        // Vertical flip: source row 0 lands at the bottom
        let dst_start = (height as usize - 1 - row) * row_bytes;
        let dst_row = &mut out[dst_start..dst_start + row_bytes];

        for (s, d) in src_row
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL))
        {
            d[0] = s[2]; // R
            d[1] = s[1]; // G
            d[2] = s[0]; // B
            d[3] = s[3]; // A
        }
    }

    Ok(out.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_matches_input() {
        for (w, h) in [(1, 1), (2, 2), (16, 9), (640, 480)] {
            let src = vec![0x5Au8; w * h * BYTES_PER_PIXEL];
            let out = encode(&src, w as u32, h as u32).unwrap();
            assert_eq!(out.len(), src.len());
        }
    }

    #[test]
    fn one_row_swaps_channels_in_place() {
        // 2x1: flip of a single row is the identity, so only the
        // BGRA -> RGBA swap is visible.
        let src = [10, 20, 30, 40, 50, 60, 70, 80];
        let out = encode(&src, 2, 1).unwrap();
        assert_eq!(&out[..], &[30, 20, 10, 40, 70, 60, 50, 80]);
    }

    #[test]
    fn one_column_flips_rows() {
        // 1x2: pixel at row 0 lands in row 1 and vice versa
        let src = [10, 20, 30, 40, 50, 60, 70, 80];
        let out = encode(&src, 1, 2).unwrap();
        assert_eq!(&out[..], &[70, 60, 50, 80, 30, 20, 10, 40]);
    }

    #[test]
    fn two_by_two_flips_and_reorders() {
        #[rustfmt::skip]
        let src = [
            1, 2, 3, 4,     5, 6, 7, 8,     // row 0
            9, 10, 11, 12,  13, 14, 15, 16, // row 1
        ];
        let out = encode(&src, 2, 2).unwrap();
        #[rustfmt::skip]
        let want = [
            11, 10, 9, 12,  15, 14, 13, 16, // was row 1
            3, 2, 1, 4,     7, 6, 5, 8,     // was row 0
        ];
        assert_eq!(&out[..], &want);
    }

    #[test]
    fn output_does_not_alias_input() {
        let src = vec![1u8; 4 * BYTES_PER_PIXEL];
        let out = encode(&src, 2, 2).unwrap();
        assert_ne!(src.as_ptr(), out.as_ptr());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let src = [0u8; 7];
        match encode(&src, 2, 1) {
            Err(SendError::InvalidInput {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn zero_sized_frame_is_empty() {
        let out = encode(&[], 0, 0).unwrap();
        assert!(out.is_empty());
    }
}

//! Fixed 32-byte header at the start of the shared region
//!
//! Little-endian i32 fields at fixed offsets, agreed out-of-band with the
//! consumer:
//!
//!  0  -- declared maximum payload capacity (bytes)
//!  4  -- frame width (pixels)
//!  8  -- frame height (pixels)
//! 12  -- row stride
//! 16  -- pixel format tag
//! 20  -- resize-mode tag
//! 24  -- mirror-mode tag
//! 28  -- liveness/backpressure hint
//! 32  -- end of header, payload follows

pub const HEADER_SIZE: usize = 32;

/// Resolution ceiling the region is sized for
pub const MAX_WIDTH: u32 = 3840;
pub const MAX_HEIGHT: u32 = 2160;

/// Declared payload capacity; the x2 headroom above one raw max-resolution
/// frame is part of the wire contract and must not change.
pub const MAX_FRAME_BYTES: usize = (MAX_WIDTH as usize) * (MAX_HEIGHT as usize) * 4 * 2;

/// Wait budget (ms) the consumer applies when polling for frames
pub const RECEIVE_MAX_WAIT: i32 = 200;

/// Initial value of the liveness hint field
pub const LIVENESS_INIT: i32 = i32::MAX - RECEIVE_MAX_WAIT;

pub const FORMAT_UINT8: i32 = 0;
pub const RESIZE_DISABLED: i32 = 1;
pub const MIRROR_DISABLED: i32 = 0;

const OFF_CAPACITY: usize = 0;
const OFF_WIDTH: usize = 4;
const OFF_HEIGHT: usize = 8;
const OFF_STRIDE: usize = 12;
const OFF_FORMAT: usize = 16;
const OFF_RESIZE: usize = 20;
const OFF_MIRROR: usize = 24;
const OFF_LIVENESS: usize = 28;

fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_i32(buf: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(raw)
}

/// Write the one-time fields set when the channel comes up.
///
/// The six per-frame fields are left for the first real send.
pub fn write_init(header: &mut [u8]) {
    put_i32(header, OFF_CAPACITY, MAX_FRAME_BYTES as i32);
    put_i32(header, OFF_LIVENESS, LIVENESS_INIT);
}

/// The six per-frame fields written on every send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: i32,
    pub resize_mode: i32,
    pub mirror_mode: i32,
}

impl FrameInfo {
    /// Frame fields for the fixed on-wire format at the given dimensions
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width,
            format: FORMAT_UINT8,
            resize_mode: RESIZE_DISABLED,
            mirror_mode: MIRROR_DISABLED,
        }
    }

    /// Write all six fields; no partial write is meaningful, so this
    /// completes before any signal may be raised.
    pub fn write_to(&self, header: &mut [u8]) {
        put_i32(header, OFF_WIDTH, self.width as i32);
        put_i32(header, OFF_HEIGHT, self.height as i32);
        put_i32(header, OFF_STRIDE, self.stride as i32);
        put_i32(header, OFF_FORMAT, self.format);
        put_i32(header, OFF_RESIZE, self.resize_mode);
        put_i32(header, OFF_MIRROR, self.mirror_mode);
    }
}

/// Full header snapshot, as a consumer reads it after a "sent" edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub capacity: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: i32,
    pub resize_mode: i32,
    pub mirror_mode: i32,
    pub liveness: i32,
}

impl FrameHeader {
    pub fn read_from(header: &[u8]) -> Self {
        Self {
            capacity: get_i32(header, OFF_CAPACITY),
            width: get_i32(header, OFF_WIDTH),
            height: get_i32(header, OFF_HEIGHT),
            stride: get_i32(header, OFF_STRIDE),
            format: get_i32(header, OFF_FORMAT),
            resize_mode: get_i32(header, OFF_RESIZE),
            mirror_mode: get_i32(header, OFF_MIRROR),
            liveness: get_i32(header, OFF_LIVENESS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sets_capacity_and_liveness_only() {
        let mut buf = [0u8; HEADER_SIZE];
        write_init(&mut buf);

        let h = FrameHeader::read_from(&buf);
        assert_eq!(h.capacity, MAX_FRAME_BYTES as i32);
        assert_eq!(h.liveness, i32::MAX - RECEIVE_MAX_WAIT);
        assert_eq!(h.width, 0);
        assert_eq!(h.height, 0);
    }

    #[test]
    fn frame_fields_land_at_fixed_offsets() {
        let mut buf = [0u8; HEADER_SIZE];
        FrameInfo::for_dimensions(1920, 1080).write_to(&mut buf);

        assert_eq!(&buf[4..8], &1920i32.to_le_bytes());
        assert_eq!(&buf[8..12], &1080i32.to_le_bytes());
        assert_eq!(&buf[12..16], &1920i32.to_le_bytes());
        assert_eq!(&buf[16..20], &FORMAT_UINT8.to_le_bytes());
        assert_eq!(&buf[20..24], &RESIZE_DISABLED.to_le_bytes());
        assert_eq!(&buf[24..28], &MIRROR_DISABLED.to_le_bytes());
    }

    #[test]
    fn snapshot_round_trips() {
        let mut buf = [0u8; HEADER_SIZE];
        write_init(&mut buf);
        FrameInfo::for_dimensions(640, 480).write_to(&mut buf);

        let h = FrameHeader::read_from(&buf);
        assert_eq!(h.width, 640);
        assert_eq!(h.height, 480);
        assert_eq!(h.stride, 640);
        assert_eq!(h.format, FORMAT_UINT8);
        assert_eq!(h.resize_mode, RESIZE_DISABLED);
        assert_eq!(h.mirror_mode, MIRROR_DISABLED);
    }
}

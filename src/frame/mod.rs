pub mod encode;
pub mod header;

pub use encode::encode;
pub use header::{FrameHeader, FrameInfo};

use bytes::Bytes;

/// A raw BGRA bitmap handed to the channel for publication
#[derive(Debug, Clone)]
pub struct FrameRequest {
    /// Top-down rows, 4 bytes per pixel, BGRA order
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

impl FrameRequest {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
        }
    }

    /// Byte length the dimensions imply
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * encode::BYTES_PER_PIXEL
    }
}

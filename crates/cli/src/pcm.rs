//! Decoder for headerless 32-bit float little-endian mono PCM.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lingua_core::waveform::{AudioDecoder, SampleBuffer};

pub struct PcmDecoder {
    pub sample_rate: u32,
}

impl PcmDecoder {
    /// Seconds of audio held in `len` bytes.
    pub fn duration_of(&self, len: usize) -> f64 {
        (len / 4) as f64 / self.sample_rate.max(1) as f64
    }
}

#[async_trait]
impl AudioDecoder for PcmDecoder {
    async fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        if self.sample_rate == 0 {
            return Err(anyhow!("sample rate must be positive"));
        }
        if bytes.len() % 4 != 0 {
            return Err(anyhow!("truncated PCM data: {} bytes", bytes.len()));
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(SampleBuffer::new(self.sample_rate, samples))
    }
}

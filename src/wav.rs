//! Canonical PCM WAV encoding.
//!
//! Produces a 44-byte RIFF header (`RIFF`, `WAVE`, a 16-byte `fmt ` chunk and
//! a `data` chunk) followed by interleaved little-endian samples. No other
//! chunks are written.

use std::io::{self, Write};

/// Size of the RIFF/fmt/data header preceding the sample data.
pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Audio parameters written into the WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavParams {
    /// 16-bit PCM with the given rate and channel count.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }

    fn bytes_per_sample(&self) -> u32 {
        u32::from(self.bits_per_sample / 8)
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * self.bytes_per_sample()
    }
}

/// Build the 44-byte header for `sample_count` interleaved samples.
///
/// Fails with `InvalidInput` unless `params` describe 16-bit samples, or when
/// the data would not fit a RIFF container's 32-bit sizes.
pub fn wav_header(sample_count: usize, params: WavParams) -> io::Result<[u8; WAV_HEADER_LEN]> {
    if params.bits_per_sample != 16 {
        return Err(invalid_input(format!(
            "samples are 16-bit, got bits_per_sample = {}",
            params.bits_per_sample
        )));
    }

    let data_len = u32::try_from(sample_count)
        .ok()
        .and_then(|count| count.checked_mul(params.bytes_per_sample()))
        .ok_or_else(|| too_large(sample_count))?;
    let riff_len = data_len
        .checked_add(WAV_HEADER_LEN as u32 - 8)
        .ok_or_else(|| too_large(sample_count))?;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    header[22..24].copy_from_slice(&params.channels.to_le_bytes());
    header[24..28].copy_from_slice(&params.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&params.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&params.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&params.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    Ok(header)
}

/// Encode samples into an in-memory WAV file.
pub fn encode_wav(samples: &[i16], params: WavParams) -> io::Result<Vec<u8>> {
    let header = wav_header(samples.len(), params)?;
    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    bytes.extend_from_slice(&header);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(bytes)
}

/// Stream a WAV file to `writer`.
///
/// Nothing is written when the header cannot be built.
pub fn write_wav<W: Write>(writer: &mut W, samples: &[i16], params: WavParams) -> io::Result<()> {
    writer.write_all(&wav_header(samples.len(), params)?)?;
    // Write in blocks to avoid one syscall per sample on unbuffered writers.
    let mut block = Vec::with_capacity(8192);
    for chunk in samples.chunks(4096) {
        block.clear();
        for sample in chunk {
            block.extend_from_slice(&sample.to_le_bytes());
        }
        writer.write_all(&block)?;
    }
    writer.flush()
}

fn invalid_input(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn too_large(sample_count: usize) -> io::Error {
    invalid_input(format!(
        "{sample_count} samples exceed the 4 GiB limit of a WAV file"
    ))
}

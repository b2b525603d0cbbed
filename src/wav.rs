use std::io::{self, BufReader, Read, Seek, SeekFrom};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// RIFF WAV file reader for integer PCM audio.
///
/// Samples come back as `i32`, right-justified at the file's bit depth, in
/// `(time, channel)` axes.
pub struct WAVReader<R: Read + Seek> {
    reader: BufReader<R>,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    frames_remaining: u64,
}

impl<R: Read + Seek> WAVReader<R> {
    /// Parses the RIFF header and seeks to the first sample.
    pub fn new(reader: R) -> io::Result<Self> {
        let mut reader = BufReader::new(reader);

        let mut riff = [0u8; 12];
        reader.read_exact(&mut riff)?;
        if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Not a RIFF WAVE file",
            ));
        }

        let mut num_channels = 0u16;
        let mut sample_rate = 0u32;
        let mut bits_per_sample = 0u16;
        let mut data_size = None;

        // Walk chunks until the data chunk; fmt must come first.
        while data_size.is_none() {
            let mut chunk_id = [0u8; 4];
            reader.read_exact(&mut chunk_id)?;
            let mut chunk_size_bytes = [0u8; 4];
            reader.read_exact(&mut chunk_size_bytes)?;
            let chunk_size = u32::from_le_bytes(chunk_size_bytes);

            match &chunk_id {
                b"fmt " => {
                    let mut fmt = vec![0u8; chunk_size as usize];
                    reader.read_exact(&mut fmt)?;
                    if fmt.len() < 16 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "fmt chunk too short",
                        ));
                    }
                    let audio_format = u16::from_le_bytes([fmt[0], fmt[1]]);
                    if audio_format != WAVE_FORMAT_PCM && audio_format != WAVE_FORMAT_EXTENSIBLE {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Unsupported WAV audio format {audio_format:#06X}"),
                        ));
                    }
                    num_channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                    sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                    bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);
                }
                b"data" => {
                    data_size = Some(u64::from(chunk_size));
                }
                _ => {
                    // Skip unknown chunks, padded to even length.
                    let skip = u64::from(chunk_size) + u64::from(chunk_size & 1);
                    reader.seek(SeekFrom::Current(skip as i64))?;
                }
            }
        }

        if num_channels == 0 || sample_rate == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Missing fmt chunk before data chunk",
            ));
        }
        if !matches!(bits_per_sample, 16 | 24 | 32) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported bits_per_sample {bits_per_sample}"),
            ));
        }

        let bytes_per_frame = u64::from(num_channels) * u64::from(bits_per_sample / 8);
        Ok(Self {
            reader,
            num_channels,
            sample_rate,
            bits_per_sample,
            frames_remaining: data_size.unwrap_or(0) / bytes_per_frame,
        })
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn frames_remaining(&self) -> u64 {
        self.frames_remaining
    }

    /// Reads up to `max_frames` interleaved frames. The result is shorter
    /// than `max_frames` only at end of file; empty means exhausted.
    pub fn read_frames(&mut self, max_frames: usize) -> io::Result<Vec<Vec<i32>>> {
        let to_read = (self.frames_remaining.min(max_frames as u64)) as usize;
        let bytes_per_sample = usize::from(self.bits_per_sample / 8);
        let mut raw = vec![0u8; to_read * usize::from(self.num_channels) * bytes_per_sample];
        self.reader.read_exact(&mut raw)?;
        self.frames_remaining -= to_read as u64;

        let mut frames = Vec::with_capacity(to_read);
        let mut offset = 0;
        for _ in 0..to_read {
            let mut frame = Vec::with_capacity(usize::from(self.num_channels));
            for _ in 0..self.num_channels {
                let sample_bytes = &raw[offset..offset + bytes_per_sample];
                frame.push(decode_sample_le(sample_bytes));
                offset += bytes_per_sample;
            }
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Sign-extends a little-endian PCM sample into an `i32`.
fn decode_sample_le(bytes: &[u8]) -> i32 {
    let mut value: i32 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= i32::from(byte) << (8 * i);
    }
    let shift = 32 - 8 * bytes.len() as u32;
    (value << shift) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(num_channels: u16, bits_per_sample: u16, data: &[u8]) -> Vec<u8> {
        let bytes_per_frame = num_channels * bits_per_sample / 8;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");

        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        bytes.extend_from_slice(&num_channels.to_le_bytes());
        bytes.extend_from_slice(&48000u32.to_le_bytes());
        bytes.extend_from_slice(&(48000 * u32::from(bytes_per_frame)).to_le_bytes());
        bytes.extend_from_slice(&bytes_per_frame.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn reads_16_bit_stereo_frames() -> io::Result<()> {
        // Two frames: (1, -1), (256, 2).
        let data = [1, 0, 0xff, 0xff, 0, 1, 2, 0];
        let mut reader = WAVReader::new(Cursor::new(wav_bytes(2, 16, &data)))?;

        assert_eq!(reader.num_channels(), 2);
        assert_eq!(reader.sample_rate(), 48000);
        assert_eq!(reader.bits_per_sample(), 16);
        assert_eq!(reader.frames_remaining(), 2);

        assert_eq!(reader.read_frames(4)?, vec![vec![1, -1], vec![256, 2]]);
        assert!(reader.read_frames(4)?.is_empty());
        Ok(())
    }

    #[test]
    fn reads_24_bit_mono_with_sign_extension() -> io::Result<()> {
        let data = [0x56, 0x34, 0x12, 0xff, 0xff, 0xff];
        let mut reader = WAVReader::new(Cursor::new(wav_bytes(1, 24, &data)))?;
        assert_eq!(reader.read_frames(2)?, vec![vec![0x123456], vec![-1]]);
        Ok(())
    }

    #[test]
    fn partial_reads_stop_at_the_frame_budget() -> io::Result<()> {
        let data = [1, 0, 2, 0, 3, 0];
        let mut reader = WAVReader::new(Cursor::new(wav_bytes(1, 16, &data)))?;
        assert_eq!(reader.read_frames(2)?.len(), 2);
        assert_eq!(reader.read_frames(2)?, vec![vec![3]]);
        Ok(())
    }

    #[test]
    fn skips_unknown_chunks() -> io::Result<()> {
        let mut bytes = wav_bytes(1, 16, &[1, 0]);
        // Splice a LIST chunk between fmt and data.
        let data_offset = bytes.len() - (8 + 2);
        let mut list = b"LIST".to_vec();
        list.extend_from_slice(&4u32.to_le_bytes());
        list.extend_from_slice(b"info");
        bytes.splice(data_offset..data_offset, list);

        let mut reader = WAVReader::new(Cursor::new(bytes))?;
        assert_eq!(reader.read_frames(1)?, vec![vec![1]]);
        Ok(())
    }

    #[test]
    fn rejects_non_wave_files() {
        assert!(WAVReader::new(Cursor::new(b"JUNKJUNKJUNK".to_vec())).is_err());
    }
}

// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::buffer::DecodedBuffer;

/// Error types for decoding fetched audio payloads.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported audio data: {0}")]
    Unsupported(String),

    #[error("Audio decode error: {0}")]
    Audio(#[from] SymphoniaError),
}

/// Decodes an in-memory audio payload (MP3, WAV, FLAC, OGG, ...) into a buffer.
///
/// `extension` is an optional hint for the format probe. Returns `Ok(None)` when the payload
/// parses but contains no audio frames.
pub fn decode_audio_data(
    payload: Arc<[u8]>,
    extension: Option<&str>,
) -> Result<Option<DecodedBuffer>, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(payload)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("No audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("Sample rate not specified".to_string()))?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channel_count: u16 = 0;
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            // A new chained stream starts; a note sample only ever needs the first one.
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frames are skipped, the rest of the stream is still usable.
                warn!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        channel_count = spec.channels.count() as u16;
        let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buffer.samples());
    }

    if samples.is_empty() || channel_count == 0 {
        debug!("Payload decoded to no audio frames");
        return Ok(None);
    }

    Ok(Some(DecodedBuffer::new(samples, channel_count, sample_rate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{short_ramp_wav, wav_bytes};

    #[test]
    fn test_decode_wav() {
        let payload: Arc<[u8]> = Arc::from(short_ramp_wav(44100));
        let buffer = decode_audio_data(payload, Some("wav"))
            .expect("decode failed")
            .expect("no buffer");

        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 441);
        assert!((buffer.data()[220] - 220.0 / 441.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_stereo_wav() {
        let samples = vec![0.25f32, -0.25, 0.5, -0.5, 0.75, -0.75];
        let payload: Arc<[u8]> = Arc::from(wav_bytes(&samples, 2, 48000).unwrap());
        let buffer = decode_audio_data(payload, None).unwrap().unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.data().as_slice(), samples.as_slice());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let payload: Arc<[u8]> = Arc::from(b"definitely not audio".to_vec());
        assert!(decode_audio_data(payload, Some("mp3")).is_err());
    }
}

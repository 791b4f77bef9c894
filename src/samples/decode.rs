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

//! Whole-file decoding through symphonia (WAV, MP3, FLAC, Ogg/Vorbis, AAC, ...).

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::error::DecodeError;

/// Interleaved PCM exactly as it came out of the decoder.
pub(crate) struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decodes an entire audio file into interleaved f32 samples at its native rate and
/// channel count.
pub(crate) fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let detected = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(path, e.to_string()))?;
    let mut format_reader = detected.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported(path, "no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| unsupported(path, "sample rate not specified".to_string()))?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(path, e.to_string()))?;

    let mut samples = Vec::new();
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);
    let mut sample_buffer: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;
    let mut last_skipped = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(source) => {
                return Err(DecodeError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A single bad packet is recoverable; skip it and keep going.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, error = e, "Skipping undecodable packet");
                skipped += 1;
                last_skipped = Some(e);
                continue;
            }
            Err(source) => {
                return Err(DecodeError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();
        if sample_buffer
            .as_ref()
            .is_none_or(|buffer| buffer.capacity() < needed)
        {
            sample_buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buffer) = sample_buffer.as_mut() {
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
        channels = spec.channels.count();
    }

    ensure_decoded(path, &samples, last_skipped)?;
    debug!(
        path = ?path,
        channels,
        sample_rate,
        samples = samples.len(),
        skipped,
        "Decoded audio file"
    );

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

/// Converts interleaved audio of any channel count to interleaved stereo.
///
/// Mono is duplicated to both channels. Sources with more than two channels keep
/// their first two channels (front left/right for standard layouts) and drop the
/// rest, so surround material is never summed into a louder stereo image.
pub(crate) fn to_stereo(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        2 => samples,
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        _ => samples
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// A file whose every packet failed to decode is corrupt, not silent.
fn ensure_decoded(
    path: &Path,
    samples: &[f32],
    last_skipped: Option<&'static str>,
) -> Result<(), DecodeError> {
    match last_skipped {
        Some(error) if samples.is_empty() => Err(DecodeError::Corrupt {
            path: path.to_path_buf(),
            source: SymphoniaError::DecodeError(error),
        }),
        _ => Ok(()),
    }
}

fn unsupported(path: &Path, reason: String) -> DecodeError {
    DecodeError::Unsupported {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated() {
        let stereo = to_stereo(vec![0.1, 0.2, 0.3], 1);
        assert_eq!(stereo, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_stereo_passes_through() {
        let stereo = to_stereo(vec![0.1, -0.1, 0.2, -0.2], 2);
        assert_eq!(stereo, vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn test_surround_keeps_first_two_channels() {
        // Two frames of 4-channel audio.
        let quad = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(to_stereo(quad, 4), vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = decode_file(Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(DecodeError::Io { .. })));
    }

    #[test]
    fn test_no_decodable_packets_is_corrupt() {
        let path = Path::new("broken.mp3");
        assert!(matches!(
            ensure_decoded(path, &[], Some("invalid frame header")),
            Err(DecodeError::Corrupt { .. })
        ));
        // Some packets decoded, so the skipped ones are tolerated.
        assert!(ensure_decoded(path, &[0.1, 0.1], Some("invalid frame header")).is_ok());
        // An empty stream with no failures is just silence.
        assert!(ensure_decoded(path, &[], None).is_ok());
    }

    #[test]
    fn test_garbage_file_is_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not audio at all").expect("write");

        let result = decode_file(&path);
        assert!(matches!(result, Err(DecodeError::Unsupported { .. })));
    }
}

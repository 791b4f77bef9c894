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

//! One-shot, load-time sample rate conversion using rubato's band-limited sinc
//! interpolator.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Upper bound on flush iterations once the input is exhausted.
const MAX_FLUSH_BLOCKS: usize = 16;

/// Resamples interleaved audio from `source_rate` to `target_rate`.
///
/// The output is trimmed to `round(frames * target_rate / source_rate)` frames with the
/// resampler's group delay removed, so the result lines up with the input in time.
pub(crate) fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, String> {
    if channels == 0 || samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let frames = samples.len() / channels;
    let expected_frames = (frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, INPUT_BLOCK_SIZE, channels)
        .map_err(|e| e.to_string())?;

    let planar = deinterleave(samples, channels, frames);
    let delay = resampler.output_delay();
    let wanted = expected_frames + delay;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + INPUT_BLOCK_SIZE); channels];
    let mut scratch = resampler.output_buffer_allocate(true);
    let mut position = 0;

    while position + resampler.input_frames_next() <= frames {
        let needed = resampler.input_frames_next();
        let block: Vec<&[f32]> = planar
            .iter()
            .map(|ch| &ch[position..position + needed])
            .collect();
        let (consumed, produced) = resampler
            .process_into_buffer(&block, &mut scratch, None)
            .map_err(|e| e.to_string())?;
        append(&mut output, &scratch, produced);
        position += consumed;
    }

    if position < frames {
        let tail: Vec<&[f32]> = planar.iter().map(|ch| &ch[position..]).collect();
        let (_, produced) = resampler
            .process_partial_into_buffer(Some(tail.as_slice()), &mut scratch, None)
            .map_err(|e| e.to_string())?;
        append(&mut output, &scratch, produced);
    }

    // Push silence through until the delayed tail has come out the other side.
    for _ in 0..MAX_FLUSH_BLOCKS {
        if output[0].len() >= wanted {
            break;
        }
        let (_, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut scratch, None)
            .map_err(|e| e.to_string())?;
        if produced == 0 {
            break;
        }
        append(&mut output, &scratch, produced);
    }

    for ch in output.iter_mut() {
        ch.drain(..delay.min(ch.len()));
        ch.resize(expected_frames, 0.0);
    }

    Ok(interleave(&output, expected_frames))
}

fn deinterleave(samples: &[f32], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in planar.iter_mut().zip(frame) {
            ch.push(sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>], frames: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for ch in planar {
            samples.push(ch[frame]);
        }
    }
    samples
}

fn append(output: &mut [Vec<f32>], scratch: &[Vec<f32>], frames: usize) {
    for (out, produced) in output.iter_mut().zip(scratch) {
        out.extend_from_slice(&produced[..frames.min(produced.len())]);
    }
}

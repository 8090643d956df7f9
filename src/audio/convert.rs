//! Sample-level helpers between the decoder and the output device.

use rubato::{FftFixedIn, Resampler};

use crate::error::ClientError;

const RESAMPLER_CHUNK_FRAMES: usize = 1024;
const RESAMPLER_SUB_CHUNKS: usize = 2;

/// Converts interleaved frames from `source` to `target` channels.
///
/// Mono fans out to every output channel, anything downmixed to mono is
/// averaged, extra channels are dropped and missing ones are silent.
pub(crate) fn remap_channels(samples: &[f32], source: usize, target: usize) -> Vec<f32> {
    if source == target {
        return samples.to_vec();
    }
    if source == 0 || target == 0 {
        return Vec::new();
    }
    let frames = samples.len() / source;
    let mut remapped = Vec::with_capacity(frames * target);
    for frame in samples.chunks_exact(source) {
        if target == 1 {
            remapped.push(frame.iter().sum::<f32>() / source as f32);
            continue;
        }
        for channel in 0..target {
            let sample = match source {
                1 => frame[0],
                _ if channel < source => frame[channel],
                _ => 0.0,
            };
            remapped.push(sample);
        }
    }
    remapped
}

pub(crate) fn quantize_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub(crate) fn quantize_u16(sample: f32) -> u16 {
    ((sample.clamp(-1.0, 1.0) * 0.5 + 0.5) * u16::MAX as f32)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16
}

/// Streaming wrapper around an FFT resampler fed with interleaved blocks of
/// arbitrary size.
pub(crate) struct StreamResampler {
    resampler: FftFixedIn<f32>,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub(crate) fn new(
        source_rate: u32,
        target_rate: u32,
        channels: usize,
    ) -> Result<Self, ClientError> {
        if channels == 0 {
            return Err(ClientError::Playback(
                "cannot resample zero channels".to_string(),
            ));
        }
        let resampler = FftFixedIn::<f32>::new(
            source_rate as usize,
            target_rate as usize,
            RESAMPLER_CHUNK_FRAMES,
            RESAMPLER_SUB_CHUNKS,
            channels,
        )
        .map_err(|err| ClientError::Playback(format!("resampler setup failed: {err}")))?;
        Ok(Self {
            resampler,
            pending: vec![Vec::new(); channels],
        })
    }

    /// Buffers `interleaved` and appends every full resampled chunk to `out`.
    pub(crate) fn push(&mut self, interleaved: &[f32], out: &mut Vec<f32>) -> Result<(), ClientError> {
        let channels = self.pending.len();
        for frame in interleaved.chunks_exact(channels) {
            for (channel, sample) in frame.iter().enumerate() {
                self.pending[channel].push(*sample);
            }
        }
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending[0].len() < needed {
                return Ok(());
            }
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = self
                .resampler
                .process(&chunk, None)
                .map_err(|err| ClientError::Playback(format!("resampling failed: {err}")))?;
            interleave_into(&resampled, out);
        }
    }

    /// Resamples whatever is still buffered.
    pub(crate) fn flush(&mut self, out: &mut Vec<f32>) -> Result<(), ClientError> {
        if self.pending[0].is_empty() {
            return Ok(());
        }
        let resampled = self
            .resampler
            .process_partial(Some(self.pending.as_slice()), None)
            .map_err(|err| ClientError::Playback(format!("resampling failed: {err}")))?;
        for channel in &mut self.pending {
            channel.clear();
        }
        interleave_into(&resampled, out);
        Ok(())
    }
}

fn interleave_into(channels: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = channels.first().map_or(0, Vec::len);
    out.reserve(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            out.push(channel[frame]);
        }
    }
}

//! Network audio stream handle: HTTP body → symphonia → rubato → cpal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::convert::{quantize_i16, quantize_u16, remap_channels, StreamResampler};
use crate::error::ClientError;
use crate::playback::{MediaBackend, StreamHandle};
use crate::transport::map_ureq_error;

/// Opens media URLs with the shared HTTP agent and plays them on the default
/// output device.
pub struct StreamingBackend {
    agent: ureq::Agent,
}

impl StreamingBackend {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl MediaBackend for StreamingBackend {
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamHandle>, ClientError> {
        let response = self.agent.get(url).call().map_err(map_ureq_error)?;
        let mut hint = Hint::new();
        if let Some(content_type) = response.header("Content-Type") {
            hint.mime_type(content_type);
        }
        let source = ReadOnlySource::new(response.into_reader());
        let media_source = MediaSourceStream::new(Box::new(source), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                media_source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| ClientError::Playback(format!("unrecognized stream format: {err}")))?;
        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| ClientError::Playback("stream has no audio track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|err| ClientError::Playback(format!("unsupported codec: {err}")))?;
        let source_rate = params
            .sample_rate
            .ok_or_else(|| ClientError::Playback("stream has no sample rate".to_string()))?;
        let declared_length_ms = params
            .n_frames
            .map(|frames| frames.saturating_mul(1000) / source_rate as u64);

        let output = OutputDevice::open_default()?;
        let shared = Arc::new(StreamShared::new(output.channels, output.sample_rate));
        let stream = output.build_stream(shared.clone())?;

        let job = DecodeJob {
            format,
            decoder,
            track_id,
            source_rate,
            shared: shared.clone(),
        };
        thread::Builder::new()
            .name("stream-decoder".to_string())
            .spawn(move || job.run())
            .map_err(|err| ClientError::Playback(format!("cannot start decoder: {err}")))?;

        debug!(
            "AudioStream: opened {} Hz stream, output {} Hz x{}",
            source_rate, output.sample_rate, output.channels
        );
        Ok(Box::new(AudioStream {
            stream: Some(stream),
            shared,
            declared_length_ms,
        }))
    }
}

/// State shared by the decoder thread, the output callback and the handle.
///
/// `samples` holds interleaved output-rate frames; `cursor` is a sample index
/// into it and always sits on a frame boundary.
struct StreamShared {
    samples: Mutex<Vec<f32>>,
    cursor: AtomicUsize,
    playing: AtomicBool,
    decode_done: AtomicBool,
    cancelled: AtomicBool,
    channels: usize,
    sample_rate: u32,
}

impl StreamShared {
    fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            decode_done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            channels,
            sample_rate,
        }
    }

    fn samples(&self) -> MutexGuard<'_, Vec<f32>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn samples_to_ms(&self, samples: usize) -> u64 {
        let frames = (samples / self.channels) as u64;
        frames * 1000 / self.sample_rate as u64
    }

    fn ms_to_samples(&self, position_ms: u64) -> usize {
        let frames = position_ms.saturating_mul(self.sample_rate as u64) / 1000;
        (frames as usize).saturating_mul(self.channels)
    }

    fn append(&self, block: &[f32]) {
        if block.is_empty() || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        self.samples().extend_from_slice(block);
    }

    fn render<T: Copy>(&self, output: &mut [T], convert: impl Fn(f32) -> T, silence: T) {
        if !self.playing.load(Ordering::Acquire) {
            output.fill(silence);
            return;
        }
        let samples = self.samples();
        let mut cursor = self.cursor.load(Ordering::Acquire);
        for slot in output.iter_mut() {
            *slot = match samples.get(cursor) {
                Some(sample) => {
                    cursor += 1;
                    convert(*sample)
                }
                None => silence,
            };
        }
        self.cursor.store(cursor, Ordering::Release);
    }
}

struct OutputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: usize,
    sample_rate: u32,
}

impl OutputDevice {
    fn open_default() -> Result<Self, ClientError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ClientError::Playback("no audio output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|err| ClientError::Playback(format!("no output configuration: {err}")))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        Ok(Self {
            channels: config.channels as usize,
            sample_rate: config.sample_rate.0,
            device,
            config,
            sample_format,
        })
    }

    fn build_stream(&self, shared: Arc<StreamShared>) -> Result<cpal::Stream, ClientError> {
        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.device.build_output_stream(
                &self.config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    shared.render(output, |sample| sample.clamp(-1.0, 1.0), 0.0);
                },
                |err| error!("AudioStream: output error: {}", err),
                None,
            ),
            cpal::SampleFormat::I16 => self.device.build_output_stream(
                &self.config,
                move |output: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    shared.render(output, quantize_i16, 0);
                },
                |err| error!("AudioStream: output error: {}", err),
                None,
            ),
            cpal::SampleFormat::U16 => self.device.build_output_stream(
                &self.config,
                move |output: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    shared.render(output, quantize_u16, u16::MAX / 2 + 1);
                },
                |err| error!("AudioStream: output error: {}", err),
                None,
            ),
            other => {
                return Err(ClientError::Playback(format!(
                    "unsupported output sample format: {other:?}"
                )))
            }
        };
        stream.map_err(|err| ClientError::Playback(format!("cannot build output stream: {err}")))
    }
}

struct DecodeJob {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    source_rate: u32,
    shared: Arc<StreamShared>,
}

impl DecodeJob {
    fn run(mut self) {
        let target_channels = self.shared.channels;
        let mut resampler = if self.source_rate == self.shared.sample_rate {
            None
        } else {
            match StreamResampler::new(self.source_rate, self.shared.sample_rate, target_channels) {
                Ok(resampler) => Some(resampler),
                Err(err) => {
                    error!("AudioStream: {}", err);
                    self.shared.decode_done.store(true, Ordering::Release);
                    return;
                }
            }
        };

        let mut block = Vec::new();
        while !self.shared.cancelled.load(Ordering::Acquire) {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(err) => {
                    warn!("AudioStream: stream ended early: {}", err);
                    break;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    debug!("AudioStream: skipping corrupt packet: {}", err);
                    continue;
                }
                Err(err) => {
                    error!("AudioStream: decode failed: {}", err);
                    break;
                }
            };
            let spec = *decoded.spec();
            let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buffer.copy_interleaved_ref(decoded);
            let remapped = remap_channels(
                sample_buffer.samples(),
                spec.channels.count(),
                target_channels,
            );

            block.clear();
            match resampler.as_mut() {
                Some(resampler) => {
                    if let Err(err) = resampler.push(&remapped, &mut block) {
                        error!("AudioStream: {}", err);
                        break;
                    }
                }
                None => block.extend_from_slice(&remapped),
            }
            self.shared.append(&block);
        }

        if let Some(resampler) = resampler.as_mut() {
            block.clear();
            match resampler.flush(&mut block) {
                Ok(()) => self.shared.append(&block),
                Err(err) => error!("AudioStream: {}", err),
            }
        }
        self.shared.decode_done.store(true, Ordering::Release);
        debug!("AudioStream: decoder finished");
    }
}

/// A live stream. Dropping it releases the output device.
struct AudioStream {
    stream: Option<cpal::Stream>,
    shared: Arc<StreamShared>,
    declared_length_ms: Option<u64>,
}

impl StreamHandle for AudioStream {
    fn play(&mut self) -> Result<(), ClientError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ClientError::Playback("stream already released".to_string()))?;
        stream
            .play()
            .map_err(|err| ClientError::Playback(format!("cannot start output: {err}")))?;
        self.shared.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), ClientError> {
        self.shared.playing.store(false, Ordering::Release);
        if let Some(stream) = self.stream.as_ref() {
            if let Err(err) = stream.pause() {
                debug!("AudioStream: device pause unsupported, muting instead: {}", err);
            }
        }
        Ok(())
    }

    fn set_position_ms(&mut self, position_ms: u64) {
        let samples = self.shared.samples();
        let decoded = samples.len() - samples.len() % self.shared.channels;
        let target = self.shared.ms_to_samples(position_ms).min(decoded);
        self.shared.cursor.store(target, Ordering::Release);
    }

    fn position_ms(&self) -> Option<u64> {
        Some(self.shared.samples_to_ms(self.shared.cursor.load(Ordering::Acquire)))
    }

    fn length_ms(&self) -> Option<u64> {
        if let Some(length_ms) = self.declared_length_ms {
            return Some(length_ms);
        }
        if !self.shared.decode_done.load(Ordering::Acquire) {
            return None;
        }
        Some(self.shared.samples_to_ms(self.shared.samples().len()))
    }

    fn is_finished(&self) -> bool {
        self.shared.decode_done.load(Ordering::Acquire)
            && self.shared.cursor.load(Ordering::Acquire) >= self.shared.samples().len()
    }

    fn release(&mut self) -> Result<(), ClientError> {
        self.shared.playing.store(false, Ordering::Release);
        self.shared.cancelled.store(true, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            let mut samples = self.shared.samples();
            samples.clear();
            samples.shrink_to_fit();
            info!("AudioStream: released");
        }
        Ok(())
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::StreamShared;

    #[test]
    fn test_render_outputs_silence_while_paused() {
        let shared = StreamShared::new(2, 1000);
        shared.append(&[0.5, 0.5, 0.25, 0.25]);
        let mut output = [1.0_f32; 4];
        shared.render(&mut output, |sample| sample, 0.0);
        assert_eq!(output, [0.0; 4]);
        assert_eq!(shared.cursor.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_render_advances_cursor_and_pads_underrun() {
        let shared = StreamShared::new(2, 1000);
        shared.append(&[0.5, 0.5, 0.25, 0.25]);
        shared.playing.store(true, Ordering::Release);
        let mut output = [1.0_f32; 6];
        shared.render(&mut output, |sample| sample, 0.0);
        assert_eq!(output, [0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(shared.cursor.load(Ordering::Acquire), 4);
    }

    #[test]
    fn test_time_conversions_are_frame_aligned() {
        let shared = StreamShared::new(2, 48_000);
        assert_eq!(shared.ms_to_samples(1_000), 96_000);
        assert_eq!(shared.samples_to_ms(96_000), 1_000);
        assert_eq!(shared.ms_to_samples(0), 0);
    }

    #[test]
    fn test_append_is_ignored_after_cancel() {
        let shared = StreamShared::new(1, 1000);
        shared.cancelled.store(true, Ordering::Release);
        shared.append(&[0.1, 0.2]);
        assert!(shared.samples().is_empty());
    }
}

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use rtrb::{Consumer, Producer, RingBuffer};
use tk_core::SampleSource;

use crate::error::AudioError;

/// Audio capture via cpal.
///
/// Writes mono f32 samples into a lock-free ring buffer. Owns the input
/// stream exclusively: dropping the capture (or calling `close`) releases
/// the device.
///
/// # Example
/// ```no_run
/// use tk_audio::capture::AudioCapture;
/// let capture = AudioCapture::open("").unwrap();
/// ```
pub struct AudioCapture {
    stream: Option<cpal::Stream>,
    consumer: Consumer<f32>,
    sample_rate: u32,
    device_name: String,
}

impl AudioCapture {
    /// Open an input device and start capturing.
    ///
    /// `device` is matched against device names; `""` or `"default"` selects
    /// the host default input.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if the device cannot be found,
    /// configured or started. Nothing is retained on failure.
    pub fn open(device: &str) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let input = find_input_device(&host, device)?;
        let device_name = input.name().unwrap_or_else(|_| "<sans nom>".to_string());

        let config = input
            .default_input_config()
            .map_err(|e| AudioError::unavailable(device, e))?;
        let sample_rate = config.sample_rate().0;
        let channels = usize::from(config.channels()).max(1);

        // Ring buffer: 2 seconds of audio @ sample_rate
        let buf_size = sample_rate as usize * 2;
        let (producer, consumer) = RingBuffer::new(buf_size);

        let stream_config: cpal::StreamConfig = config.clone().into();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&input, &stream_config, channels, producer)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&input, &stream_config, channels, producer)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&input, &stream_config, channels, producer)
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&input, &stream_config, channels, producer)
            }
            other => {
                return Err(AudioError::unavailable(
                    device,
                    format!("format d'échantillon non supporté : {other:?}"),
                ));
            }
        }
        .map_err(|e| AudioError::unavailable(device, e))?;

        stream
            .play()
            .map_err(|e| AudioError::unavailable(device, e))?;

        log::info!("Capture démarrée sur '{device_name}' @ {sample_rate}Hz, {channels} canal(aux)");

        Ok(Self {
            stream: Some(stream),
            consumer,
            sample_rate,
            device_name,
        })
    }

    /// Name of the opened device.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl SampleSource for AudioCapture {
    /// Read available samples from the ring buffer into `out`.
    fn read_samples(&mut self, out: &mut Vec<f32>) -> usize {
        let available = self.consumer.slots();
        out.clear();
        out.reserve(available);
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
        }
        out.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Pause du stream '{}' impossible : {e}", self.device_name);
            }
            drop(stream);
            log::info!("Capture '{}' libérée", self.device_name);
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Names of the available input devices.
///
/// # Errors
/// Returns `AudioError::StreamError` if the host cannot enumerate devices.
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Name of the host default input device, if any.
#[must_use]
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}

fn find_input_device(host: &cpal::Host, selector: &str) -> Result<cpal::Device, AudioError> {
    if selector.is_empty() || selector.eq_ignore_ascii_case("default") {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::unavailable(selector, "aucun périphérique d'entrée par défaut"));
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| AudioError::unavailable(selector, e))?;
    devices
        .find(|d| d.name().is_ok_and(|name| name == selector))
        .ok_or_else(|| AudioError::unavailable(selector, "périphérique introuvable"))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut producer: Producer<f32>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Downmix to mono and push into ring buffer
            for chunk in data.chunks(channels) {
                let mono: f32 =
                    chunk.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / chunk.len() as f32;
                let _ = producer.push(mono);
            }
        },
        |err| {
            log::error!("Audio stream error: {err}");
        },
        None,
    )
}

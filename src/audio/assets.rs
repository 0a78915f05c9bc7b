//! Click asset loading
//!
//! Click sounds ship inside the binary and are served from a read-only
//! name → bytes store. Loading a click from disk is also supported for custom
//! sounds. WAV data is decoded with `hound`; compressed formats (MP3, OGG,
//! FLAC, ...) go through `symphonia`.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::sample::{ClickSample, SampleFormat};
use crate::error::AudioError;

/// Name of the regular click asset
pub const TICK_ASSET: &str = "tick.wav";
/// Name of the accented click asset
pub const ACCENT_ASSET: &str = "accent.wav";

static EMBEDDED: &[(&str, &[u8])] = &[
    (TICK_ASSET, include_bytes!("../../assets/tick.wav")),
    (ACCENT_ASSET, include_bytes!("../../assets/accent.wav")),
];

/// Raw bytes of an embedded asset.
pub fn open_embedded(name: &str) -> Result<&'static [u8], AudioError> {
    EMBEDDED
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, bytes)| *bytes)
        .ok_or_else(|| AudioError::AssetNotFound {
            name: name.to_string(),
        })
}

/// Decode an embedded asset into a click sample.
pub fn load_embedded(name: &str) -> Result<ClickSample, AudioError> {
    decode(open_embedded(name)?, name)
}

/// Read and decode a click sample from disk.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<ClickSample, AudioError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => AudioError::AssetNotFound { name: name.clone() },
        _ => AudioError::DecodeFailed {
            name: name.clone(),
            reason: err.to_string(),
        },
    })?;
    decode(&bytes, &name)
}

/// Decode `bytes`, picking the decoder from the extension of `name`.
pub fn decode(bytes: &[u8], name: &str) -> Result<ClickSample, AudioError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") | Some("wave") => decode_wav(bytes, name),
        other => decode_compressed(bytes, name, other),
    }
}

/// Decode PCM WAV data.
pub fn decode_wav(bytes: &[u8], name: &str) -> Result<ClickSample, AudioError> {
    let decode_err = |reason: String| AudioError::DecodeFailed {
        name: name.to_string(),
        reason,
    };

    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|err| decode_err(err.to_string()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| decode_err(err.to_string()))?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            match spec.bits_per_sample {
                8 => reader
                    .samples::<i8>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, _>>(),
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, _>>(),
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, _>>(),
                other => {
                    return Err(decode_err(format!("unsupported bits per sample {}", other)))
                }
            }
            .map_err(|err| decode_err(err.to_string()))?
        }
    };

    ClickSample::new(
        samples,
        SampleFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    )
}

/// Decode a compressed clip with Symphonia, interleaving all channels.
pub fn decode_compressed(
    bytes: &[u8],
    name: &str,
    extension: Option<&str>,
) -> Result<ClickSample, AudioError> {
    let decode_err = |reason: String| AudioError::DecodeFailed {
        name: name.to_string(),
        reason,
    };

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| decode_err(format!("failed to probe format: {}", err)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| decode_err(format!("failed to create decoder: {}", err)))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(decode_err(format!("format error: {}", err))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped; the rest of the clip is still usable.
            Err(SymphoniaError::DecodeError(reason)) => {
                log::debug!("[Assets] Skipping undecodable packet in {}: {}", name, reason);
            }
            Err(err) => return Err(decode_err(format!("failed to decode packet: {}", err))),
        }
    }

    if samples.is_empty() {
        return Err(decode_err("stream contains no audio".to_string()));
    }

    ClickSample::new(
        samples,
        SampleFormat {
            sample_rate,
            channels,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_asset() {
        assert_eq!(
            open_embedded("tick.mp3"),
            Err(AudioError::AssetNotFound {
                name: "tick.mp3".to_string()
            })
        );
    }

    #[test]
    fn test_embedded_ticks_decode() {
        for name in [TICK_ASSET, ACCENT_ASSET] {
            let sample = load_embedded(name).unwrap();
            assert_eq!(
                sample.format(),
                SampleFormat {
                    sample_rate: 44_100,
                    channels: 1
                }
            );
            // One second long: covers the playback window at any tempo >= 60 BPM
            assert_eq!(sample.frames(), 44_100);
        }
    }

    #[test]
    fn test_symphonia_agrees_with_hound() {
        let bytes = open_embedded(TICK_ASSET).unwrap();
        let via_hound = decode_wav(bytes, TICK_ASSET).unwrap();
        let via_symphonia = decode_compressed(bytes, TICK_ASSET, Some("wav")).unwrap();

        assert_eq!(via_hound.format(), via_symphonia.format());
        assert_eq!(via_hound.frames(), via_symphonia.frames());

        let mut a = via_hound.stream();
        let mut b = via_symphonia.stream();
        let (a, b) = (a.take(512), b.take(512));
        for (x, y) in a.samples().iter().zip(b.samples()) {
            assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
        }
    }

    const MP3_FIXTURE: &[u8] = include_bytes!("../../tests/fixtures/sample.mp3");

    #[test]
    fn test_mp3_decodes_into_playable_click() {
        let sample = decode(MP3_FIXTURE, "click.mp3").unwrap();
        assert_eq!(
            sample.format(),
            SampleFormat {
                sample_rate: 22_050,
                channels: 1
            }
        );
        assert_eq!(sample.frames(), 25_920);

        // 450 ms window at 22.05 kHz
        let window = crate::audio::metronome::frames_for(
            std::time::Duration::from_millis(450),
            sample.format().sample_rate,
        );
        assert_eq!(window, 9_922);

        let mut stream = sample.stream();
        let first = stream.take(window);
        assert_eq!(first.frames(), window);
        assert_eq!(stream.position(), window);

        stream.rewind().unwrap();
        let second = stream.take(window);
        assert_eq!(first.samples(), second.samples());
    }

    #[test]
    fn test_load_mp3_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample.mp3");
        let sample = load_file(&path).unwrap();
        assert_eq!(sample.format().sample_rate, 22_050);
        assert!(sample.frames() > 0);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let garbage = [0u8; 64];
        assert!(matches!(
            decode(&garbage, "click.wav"),
            Err(AudioError::DecodeFailed { .. })
        ));
        assert!(matches!(
            decode(&garbage, "click.mp3"),
            Err(AudioError::DecodeFailed { .. })
        ));
    }

    #[test]
    fn test_load_file_missing() {
        let path = std::env::temp_dir().join("metronome-missing-click.wav");
        assert!(matches!(
            load_file(&path),
            Err(AudioError::AssetNotFound { .. })
        ));
    }

    #[test]
    fn test_load_file_from_disk() {
        let path = std::env::temp_dir()
            .join(format!("metronome-click-{}.wav", std::process::id()));
        std::fs::write(&path, open_embedded(ACCENT_ASSET).unwrap()).unwrap();

        let sample = load_file(&path).unwrap();
        assert_eq!(sample.frames(), 44_100);

        let _ = std::fs::remove_file(&path);
    }
}

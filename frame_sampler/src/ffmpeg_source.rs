use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use dataset_common::Error;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use crate::source::{VideoInfo, VideoOpener, VideoSource};

/// Opens files through libav.
pub struct FfmpegOpener;

impl FfmpegOpener {
    pub fn new() -> anyhow::Result<Self> {
        ffmpeg::init()?;
        Ok(Self)
    }
}

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn VideoSource>> {
        let source = FfmpegSource::open(path).map_err(|err| Error::UnopenableMedia {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })?;
        Ok(Box::new(source))
    }
}

struct Demuxer {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    eof_sent: bool,
}

impl Demuxer {
    fn open(path: &Path) -> anyhow::Result<(Self, VideoInfo)> {
        let ictx = input(path).with_context(|| format!("Failed to open {path:?}"))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or(ffmpeg::Error::StreamNotFound)?;
        let stream_index = stream.index();

        let mut fps = f64::from(stream.avg_frame_rate());
        if !fps.is_finite() || fps <= 0.0 {
            fps = f64::from(stream.rate());
        }
        let total_frames = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            // Some containers don't record a frame count.
            let seconds = if stream.duration() > 0 {
                stream.duration() as f64 * f64::from(stream.time_base())
            } else {
                ictx.duration().max(0) as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
            };
            (seconds * fps).round().max(0.0) as u64
        };

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;
        let info = VideoInfo {
            fps: if fps.is_finite() { fps } else { 0.0 },
            total_frames,
            width: decoder.width(),
            height: decoder.height(),
        };
        Ok((
            Self {
                ictx,
                decoder,
                stream_index,
                eof_sent: false,
            },
            info,
        ))
    }

    /// Next decoded frame, pulling packets as the decoder asks for them.
    fn decode(&mut self, decoded: &mut Video) -> anyhow::Result<bool> {
        loop {
            if self.decoder.receive_frame(decoded).is_ok() {
                return Ok(true);
            }
            if self.eof_sent {
                return Ok(false);
            }
            let stream_index = self.stream_index;
            let packet = self
                .ictx
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// A video file decoded to RGB frames.
///
/// Seeking forward decodes and discards; seeking backward reopens the file.
pub struct FfmpegSource {
    path: PathBuf,
    demuxer: Demuxer,
    scaler: Option<Context>,
    info: VideoInfo,
    position: u64,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let (demuxer, info) = Demuxer::open(path)?;
        log::debug!(
            "Opened {path:?}: {}x{} @ {:.2} fps, {} frames",
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );
        Ok(Self {
            path: path.to_path_buf(),
            demuxer,
            scaler: None,
            info,
            position: 0,
        })
    }

    fn to_rgb(&mut self, decoded: &Video) -> anyhow::Result<RgbImage> {
        if self.scaler.is_none() {
            self.scaler = Some(Context::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                Pixel::RGB24,
                decoded.width(),
                decoded.height(),
                Flags::BILINEAR,
            )?);
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| anyhow!("scaler unavailable"))?;
        let mut rgb_frame = Video::empty();
        scaler.run(decoded, &mut rgb_frame)?;

        let (width, height) = (rgb_frame.width(), rgb_frame.height());
        let stride = rgb_frame.stride(0);
        let row = width as usize * 3;
        let data = rgb_frame.data(0);
        let mut buf = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            buf.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        RgbImage::from_raw(width, height, buf).ok_or_else(|| anyhow!("frame buffer size mismatch"))
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        let mut decoded = Video::empty();
        if !self.demuxer.decode(&mut decoded)? {
            return Ok(None);
        }
        self.position += 1;
        self.to_rgb(&decoded).map(Some)
    }

    fn seek(&mut self, frame: u64) -> anyhow::Result<()> {
        if frame < self.position {
            let (demuxer, _) = Demuxer::open(&self.path)?;
            self.demuxer = demuxer;
            self.position = 0;
        }
        let mut decoded = Video::empty();
        while self.position < frame {
            if !self.demuxer.decode(&mut decoded)? {
                break;
            }
            self.position += 1;
        }
        Ok(())
    }
}

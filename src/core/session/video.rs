//! Camera frame sampling.
//!
//! Frames are offered into a small bounded queue without ever blocking the
//! host; when the queue is full the new frame is dropped. A background task
//! takes one frame per cycle, shrinks it to at most 512 px on the longer
//! side, JPEG-encodes it and submits it as `input_image_buffer.append`. The
//! rest of the queue is discarded and the task sleeps before the next cycle.

use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::LinkReceiver;
use super::host::VideoFrame;
use crate::core::realtime::{ClientEvent, RealtimeError, RealtimeResult};

/// Frames waiting for the sampler.
pub const VIDEO_QUEUE_CAPACITY: usize = 5;

/// Pause between two submitted frames.
pub const VIDEO_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Longest side of a submitted frame.
pub const MAX_IMAGE_SIDE: u32 = 512;

const JPEG_QUALITY: u8 = 80;

/// Pixel layout inferred from buffer length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    /// Planar YUV 4:2:0 (I420)
    Yuv420,
}

impl PixelFormat {
    /// Guess the layout from `len` and the frame size.
    pub fn detect(len: usize, width: u32, height: u32) -> Option<Self> {
        let pixels = width as usize * height as usize;
        if pixels == 0 {
            return None;
        }
        if len == pixels * 3 {
            Some(Self::Rgb)
        } else if len == pixels * 4 {
            Some(Self::Rgba)
        } else if len == pixels * 3 / 2 {
            Some(Self::Yuv420)
        } else {
            None
        }
    }
}

/// Non-blocking producer side of the frame queue.
#[derive(Debug, Clone)]
pub struct VideoFrameThrottler {
    tx: mpsc::Sender<VideoFrame>,
}

impl VideoFrameThrottler {
    /// Create a throttler and the receiver its sampling task consumes.
    pub fn new() -> (Self, mpsc::Receiver<VideoFrame>) {
        let (tx, rx) = mpsc::channel(VIDEO_QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Enqueue a frame. Returns false if it was dropped.
    pub fn offer(&self, frame: VideoFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                debug!("Video sampler stopped, dropping frame");
                false
            }
        }
    }
}

/// Convert, shrink and JPEG-encode one frame.
pub fn encode_frame(frame: &VideoFrame) -> RealtimeResult<Vec<u8>> {
    let rgb = to_rgb(frame)?;
    let rgb = shrink(rgb, MAX_IMAGE_SIDE);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| RealtimeError::Media(format!("JPEG encoding failed: {e}")))?;
    Ok(jpeg)
}

fn to_rgb(frame: &VideoFrame) -> RealtimeResult<RgbImage> {
    let (w, h) = (frame.width, frame.height);
    let format = PixelFormat::detect(frame.buf.len(), w, h).ok_or_else(|| {
        RealtimeError::Media(format!(
            "Unrecognized frame layout: {} bytes for {}x{}",
            frame.buf.len(),
            w,
            h
        ))
    })?;

    let image = match format {
        PixelFormat::Rgb => RgbImage::from_raw(w, h, frame.buf.to_vec()),
        PixelFormat::Rgba => {
            RgbaImage::from_raw(w, h, frame.buf.to_vec())
                .map(|rgba| image::DynamicImage::ImageRgba8(rgba).to_rgb8())
        }
        PixelFormat::Yuv420 => Some(i420_to_rgb(&frame.buf, w, h)),
    };
    image.ok_or_else(|| RealtimeError::Media("Frame buffer does not match its size".to_string()))
}

/// BT.601 limited-range I420 to RGB.
fn i420_to_rgb(buf: &[u8], width: u32, height: u32) -> RgbImage {
    let (w, h) = (width as usize, height as usize);
    let chroma_w = w.div_ceil(2);
    let y_plane = &buf[..w * h];
    let u_offset = w * h;
    let v_offset = u_offset + (w * h) / 4;

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let luma = y_plane[y * w + x] as f32;
        let ci = (y / 2) * chroma_w + x / 2;
        let u = buf.get(u_offset + ci).copied().unwrap_or(128) as f32 - 128.0;
        let v = buf.get(v_offset + ci).copied().unwrap_or(128) as f32 - 128.0;
        let c = 1.164 * (luma - 16.0);

        let r = c + 1.596 * v;
        let g = c - 0.392 * u - 0.813 * v;
        let b = c + 2.017 * u;
        image::Rgb([clamp(r), clamp(g), clamp(b)])
    })
}

#[inline]
fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Resize so the longer side is at most `max_side`, keeping aspect ratio.
fn shrink(image: RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let longer = w.max(h);
    if longer <= max_side {
        return image;
    }
    let scale = max_side as f64 / longer as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    image::imageops::resize(&image, nw, nh, FilterType::Triangle)
}

/// Body of the video sampling task.
pub(crate) async fn run_video_sampler(
    mut frames: mpsc::Receiver<VideoFrame>,
    link: LinkReceiver,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => frame,
        };
        let Some(frame) = frame else { break };

        let sender = link.borrow().clone();
        if let Some(sender) = sender {
            match tokio::task::spawn_blocking(move || encode_frame(&frame)).await {
                Ok(Ok(jpeg)) => {
                    if let Err(e) = sender.send_request(ClientEvent::image_append(&jpeg)).await {
                        warn!("Failed to submit video frame: {}", e);
                    }
                }
                Ok(Err(e)) => warn!("Skipping video frame: {}", e),
                Err(e) => warn!("Video encoding task failed: {}", e),
            }
        }

        let mut dropped = 0usize;
        while frames.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} queued video frames", dropped);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::*;
    use bytes::Bytes;
    use tokio::sync::watch;

    use crate::core::realtime::RequestSender;

    fn rgb_frame(w: u32, h: u32) -> VideoFrame {
        VideoFrame {
            buf: Bytes::from(vec![200u8; (w * h * 3) as usize]),
            width: w,
            height: h,
        }
    }

    fn jpeg_size(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_detect_pixel_format() {
        assert_eq!(PixelFormat::detect(4 * 4 * 3, 4, 4), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::detect(4 * 4 * 4, 4, 4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::detect(4 * 4 * 3 / 2, 4, 4), Some(PixelFormat::Yuv420));
        assert_eq!(PixelFormat::detect(7, 4, 4), None);
        assert_eq!(PixelFormat::detect(0, 0, 0), None);
    }

    #[test]
    fn test_encode_shrinks_long_side() {
        let jpeg = encode_frame(&rgb_frame(1024, 256)).unwrap();
        assert_eq!(jpeg_size(&jpeg), (512, 128));

        let jpeg = encode_frame(&rgb_frame(64, 48)).unwrap();
        assert_eq!(jpeg_size(&jpeg), (64, 48));
    }

    #[test]
    fn test_encode_rgba_and_yuv() {
        let rgba = VideoFrame {
            buf: Bytes::from(vec![10u8; 8 * 8 * 4]),
            width: 8,
            height: 8,
        };
        assert_eq!(jpeg_size(&encode_frame(&rgba).unwrap()), (8, 8));

        let yuv = VideoFrame {
            buf: Bytes::from(vec![128u8; 16 * 16 * 3 / 2]),
            width: 16,
            height: 16,
        };
        assert_eq!(jpeg_size(&encode_frame(&yuv).unwrap()), (16, 16));
    }

    #[test]
    fn test_encode_rejects_unknown_layout() {
        let bad = VideoFrame {
            buf: Bytes::from(vec![0u8; 10]),
            width: 4,
            height: 4,
        };
        assert!(matches!(encode_frame(&bad), Err(RealtimeError::Media(_))));
    }

    #[test]
    fn test_offer_never_blocks_and_caps_queue() {
        let (throttler, rx) = VideoFrameThrottler::new();
        let accepted = (0..20).filter(|_| throttler.offer(rgb_frame(2, 2))).count();
        assert_eq!(accepted, VIDEO_QUEUE_CAPACITY);
        assert_eq!(rx.len(), VIDEO_QUEUE_CAPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_sends_one_frame_per_cycle() {
        let (throttler, rx) = VideoFrameThrottler::new();
        let (sender, mut requests) = RequestSender::channel(8);
        let (_link_tx, link_rx) = watch::channel(Some(sender));
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            assert!(throttler.offer(rgb_frame(4, 4)));
        }

        let task = tokio::spawn(run_video_sampler(
            rx,
            link_rx,
            VIDEO_SAMPLE_INTERVAL,
            cancel.clone(),
        ));

        match requests.recv().await.unwrap() {
            ClientEvent::InputImageBufferAppend { image } => {
                let jpeg = BASE64_STANDARD.decode(image).unwrap();
                assert_eq!(jpeg_size(&jpeg), (4, 4));
            }
            other => panic!("unexpected {:?}", other),
        }

        // The other two queued frames were discarded.
        tokio::time::sleep(VIDEO_SAMPLE_INTERVAL * 2).await;
        assert!(requests.try_recv().is_err());

        cancel.cancel();
        task.await.unwrap();
    }
}

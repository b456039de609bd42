//! Decoding of fetched image bytes into RGBA pixels, on worker threads.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

/// Number of decode worker threads
const DECODE_WORKERS: usize = 2;
/// Pending decode jobs before senders wait
const DECODE_QUEUE: usize = 64;

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }
}

/// Decode an encoded image. Animated GIFs yield their first frame.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage> {
    let format = image::guess_format(bytes).ok();

    let image = if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes)).context("Failed to decode GIF")?;
        let frame = decoder
            .into_frames()
            .next()
            .ok_or_else(|| anyhow!("GIF has no frames"))?
            .context("Failed to decode GIF frame")?;
        DynamicImage::ImageRgba8(frame.into_buffer())
    } else {
        match format {
            Some(fmt) => image::load_from_memory_with_format(bytes, fmt),
            None => image::load_from_memory(bytes),
        }
        .context("Failed to decode image")?
    };

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        data: rgba.into_raw(),
        width,
        height,
    })
}

/// Fetched bytes for one grid slot (or the expanded viewer).
pub struct DecodeJob {
    pub generation: u64,
    pub index: usize,
    pub url: String,
    pub bytes: Vec<u8>,
}

pub struct DecodeResult {
    pub generation: u64,
    pub index: usize,
    pub url: String,
    pub image: DecodedImage,
}

/// Fixed set of worker threads decoding fetched images.
///
/// Jobs whose generation no longer matches the current one are dropped both
/// before and after decoding, so a superseded batch never reaches the UI.
#[derive(Clone)]
pub struct DecodePool {
    request_tx: flume::Sender<DecodeJob>,
    generation: Arc<AtomicU64>,
}

impl DecodePool {
    pub fn new(result_tx: async_channel::Sender<DecodeResult>) -> Self {
        let (request_tx, request_rx) = flume::bounded::<DecodeJob>(DECODE_QUEUE);
        let generation = Arc::new(AtomicU64::new(0));

        for _ in 0..DECODE_WORKERS {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let current = generation.clone();
            std::thread::spawn(move || {
                while let Ok(job) = rx.recv() {
                    if job.generation != current.load(Ordering::Acquire) {
                        continue;
                    }
                    let image = match decode_bytes(&job.bytes) {
                        Ok(image) => image,
                        Err(err) => {
                            warn!(error = ?err, "Failed to decode {}", job.url);
                            continue;
                        }
                    };
                    if job.generation != current.load(Ordering::Acquire) {
                        continue;
                    }
                    debug!("decoded {} ({}x{})", job.url, image.width, image.height);
                    let result = DecodeResult {
                        generation: job.generation,
                        index: job.index,
                        url: job.url,
                        image,
                    };
                    if tx.send_blocking(result).is_err() {
                        break;
                    }
                }
            });
        }

        Self {
            request_tx,
            generation,
        }
    }

    /// Invalidate all queued work and return the new generation.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation()
    }

    /// Queue a job from an async context.
    pub async fn submit(&self, job: DecodeJob) {
        if self.request_tx.send_async(job).await.is_err() {
            warn!("Decode workers are gone, dropping job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([255u8, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png_to_rgba() {
        let decoded = decode_bytes(&png_bytes(3, 2)).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.data.len(), 3 * 2 * 4);
        assert_eq!(decoded.stride(), 12);
        assert_eq!(&decoded.data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(decode_bytes(b"<html>not found</html>").is_err());
    }

    #[test]
    fn test_pool_drops_stale_generations() {
        let (tx, rx) = async_channel::unbounded();
        let pool = DecodePool::new(tx);
        let stale = pool.generation();
        let current = pool.next_generation();
        assert!(!pool.is_current(stale));

        let submit = |generation, index| DecodeJob {
            generation,
            index,
            url: format!("http://host/view?{}", index),
            bytes: png_bytes(4, 4),
        };
        pool.request_tx.send(submit(stale, 0)).unwrap();
        pool.request_tx.send(submit(current, 1)).unwrap();

        let result = rx.recv_blocking().unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.generation, current);
        assert!(rx.try_recv().is_err());
    }
}

// ============================================================================
// IMAGE I/O: decode user files, encode PNG output
// ============================================================================
//
// Decoding runs on the rayon pool and is handed back through a oneshot
// channel so callers can await a whole batch with `join_all`.  Each file
// succeeds or fails on its own.

use std::fs::File;
use std::future::Future;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::join_all;
use image::codecs::png::PngEncoder;
use image::{ImageError, RgbaImage};

use crate::error::{CompositionError, DecodeError};
use crate::{log_info, log_warn};

pub const PNG_MIME: &str = "image/png";

/// Opaque bytes of one user-supplied file.
#[derive(Clone, Debug)]
pub struct ImageSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// A decoded bitmap at its natural resolution.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub name: String,
    pub pixels: Arc<RgbaImage>,
}

/// Read a file from disk into an [`ImageSource`] named after the file.
pub fn read_source(path: &Path) -> Result<ImageSource, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(ImageSource { name, bytes })
}

/// Decode one source on the calling thread.
pub fn decode_image(source: &ImageSource) -> Result<DecodedImage, DecodeError> {
    let name = &source.name;
    if source.bytes.is_empty() {
        return Err(DecodeError::Corrupt { name: name.clone(), reason: "file is empty".into() });
    }
    let format = image::guess_format(&source.bytes)
        .map_err(|_| DecodeError::Unsupported { name: name.clone() })?;
    let img = image::load_from_memory_with_format(&source.bytes, format).map_err(|e| match e {
        ImageError::Unsupported(_) => DecodeError::Unsupported { name: name.clone() },
        other => DecodeError::Corrupt { name: name.clone(), reason: other.to_string() },
    })?;

    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(DecodeError::Empty { name: name.clone() });
    }
    Ok(DecodedImage { name: name.clone(), pixels: Arc::new(rgba) })
}

/// Decode on the rayon pool; the returned future resolves when done.
pub fn decode_async(
    source: ImageSource,
) -> impl Future<Output = Result<DecodedImage, DecodeError>> + Send + 'static {
    let (tx, rx) = oneshot::channel();
    let name = source.name.clone();
    rayon::spawn(move || {
        // Receiver gone means nobody is waiting any more.
        let _ = tx.send(decode_image(&source));
    });
    async move { rx.await.unwrap_or(Err(DecodeError::Cancelled { name })) }
}

/// Decode a batch concurrently.  Results come back in input order.
pub async fn decode_batch(sources: Vec<ImageSource>) -> Vec<Result<DecodedImage, DecodeError>> {
    let count = sources.len();
    let results = join_all(sources.into_iter().map(decode_async)).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        log_warn!("Decoded batch of {}: {} failed", count, failed);
    } else {
        log_info!("Decoded batch of {}", count);
    }
    results
}

/// Encode as PNG into memory.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CompositionError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Encode as PNG straight to a file.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), CompositionError> {
    let file = File::create(path).map_err(ImageError::from)?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new(&mut writer);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

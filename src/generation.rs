// ============================================================================
// GENERATION BOUNDARY: request assembly + external service trait
// ============================================================================
//
// The service itself lives outside this crate.  We build the request
// (prompt with pinned dimensions + lossless PNG of the canvas), track the
// one submission allowed in flight, and validate what comes back.  No
// retries: a failure is reported once and the session returns to idle.

use image::RgbaImage;

use crate::canvas::{AspectRatio, CanvasSize, CanvasState};
use crate::compositor::{self, Interpolation};
use crate::error::{CompositionError, GenerationError, SubmitError};
use crate::io::{self, ImageSource, PNG_MIME};
use crate::{log_err, log_info};

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// User prompt with the target resolution appended.
    pub prompt: String,
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    /// Wrap as a decode source so the result can come back as a layer.
    pub fn into_source(self, name: impl Into<String>) -> ImageSource {
        ImageSource::new(name, self.bytes)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOutput {
    pub image: Option<GeneratedImage>,
    pub text: Option<String>,
}

impl GenerationOutput {
    /// An output carrying neither an image nor any text is a failure.
    pub fn validate(self) -> Result<Self, GenerationError> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_image = self.image.as_ref().is_some_and(|i| !i.bytes.is_empty());
        if has_text || has_image { Ok(self) } else { Err(GenerationError::EmptyResponse) }
    }
}

/// The external image-generation service.
pub trait GenerationService {
    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError>;
}

// ---------------------------------------------------------------------------
//  Request assembly
// ---------------------------------------------------------------------------

/// `"W:H"` for menu sizes, otherwise the reduced ratio.
pub fn aspect_label(size: CanvasSize) -> String {
    if let Some(aspect) = AspectRatio::of_size(size) {
        return aspect.label().to_string();
    }
    let g = gcd(size.width, size.height).max(1);
    format!("{}:{}", size.width / g, size.height / g)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Append the pinned output dimensions to the user's prompt.
pub fn assemble_prompt(user_prompt: &str, size: CanvasSize) -> String {
    let user_prompt = user_prompt.trim();
    let pin = format!(
        "Output exactly {}x{} pixels (aspect ratio {}).",
        size.width,
        size.height,
        aspect_label(size)
    );
    if user_prompt.is_empty() { pin } else { format!("{user_prompt}\n\n{pin}") }
}

/// Flatten the canvas and package it with the prompt.
pub fn build_composition_request(
    state: &CanvasState,
    user_prompt: &str,
) -> Result<GenerationRequest, CompositionError> {
    let size = state.size().ok_or(CompositionError::CanvasUnsized)?;
    let flat = state.composite()?;
    Ok(GenerationRequest {
        prompt: assemble_prompt(user_prompt, size),
        image_bytes: io::encode_png(&flat)?,
        mime_type: PNG_MIME.to_string(),
        width: size.width,
        height: size.height,
    })
}

/// Normalize a single reference image onto `target` and package it.
pub fn build_reference_request(
    image: &RgbaImage,
    target: CanvasSize,
    filter: Interpolation,
    user_prompt: &str,
) -> Result<GenerationRequest, CompositionError> {
    let normalized = compositor::normalize(image, target, filter)?;
    Ok(GenerationRequest {
        prompt: assemble_prompt(user_prompt, target),
        image_bytes: io::encode_png(&normalized.image)?,
        mime_type: PNG_MIME.to_string(),
        width: target.width,
        height: target.height,
    })
}

// ---------------------------------------------------------------------------
//  Submission tracking
// ---------------------------------------------------------------------------

/// At most one submission in flight per session.
#[derive(Clone, Debug, Default)]
pub struct SubmissionTracker {
    busy: bool,
    /// Last failure message, cleared by the next successful submission.
    pub last_error: Option<String>,
}

impl SubmissionTracker {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Mark busy.  Fails if a submission is already running.
    pub fn begin(&mut self) -> Result<(), SubmitError> {
        if self.busy {
            return Err(SubmitError::Busy);
        }
        self.busy = true;
        Ok(())
    }

    /// Return to idle and validate the service's answer.
    pub fn finish(
        &mut self,
        result: Result<GenerationOutput, GenerationError>,
    ) -> Result<GenerationOutput, SubmitError> {
        self.busy = false;
        match result.and_then(GenerationOutput::validate) {
            Ok(output) => {
                log_info!(
                    "Generation finished (image: {}, text: {})",
                    output.image.is_some(),
                    output.text.is_some()
                );
                self.last_error = None;
                Ok(output)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Record a failure that happened before the service was reached.
    pub fn abort(&mut self, err: SubmitError) -> SubmitError {
        self.busy = false;
        self.fail(err)
    }

    fn fail(&mut self, err: SubmitError) -> SubmitError {
        log_err!("Generation failed: {}", err);
        self.last_error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    /// Records requests and answers with a canned result.
    pub(crate) struct MockService {
        pub calls: Cell<usize>,
        pub last: RefCell<Option<GenerationRequest>>,
        pub reply: fn() -> Result<GenerationOutput, GenerationError>,
    }

    impl MockService {
        pub fn new(reply: fn() -> Result<GenerationOutput, GenerationError>) -> Self {
            Self { calls: Cell::new(0), last: RefCell::new(None), reply }
        }
    }

    impl GenerationService for MockService {
        fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
            self.calls.set(self.calls.get() + 1);
            *self.last.borrow_mut() = Some(request.clone());
            (self.reply)()
        }
    }

    #[test]
    fn prompt_pins_dimensions() {
        let p = assemble_prompt("  a cat on a sofa ", AspectRatio::Landscape.size());
        assert!(p.starts_with("a cat on a sofa\n\n"));
        assert!(p.contains("1344x768"));
        assert!(p.contains("16:9"));
        assert_eq!(aspect_label(CanvasSize { width: 1200, height: 800 }), "3:2");
        assert!(!assemble_prompt("", AspectRatio::Square.size()).starts_with('\n'));
    }

    #[test]
    fn composition_request_is_png_of_canvas_size() {
        let mut state = CanvasState::default();
        state.set_aspect_ratio(AspectRatio::Standard).unwrap();
        state.add_image("a.png", Arc::new(RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 255]))));
        let req = build_composition_request(&state, "make it pop").unwrap();
        assert_eq!((req.width, req.height), (1024, 768));
        assert_eq!(req.mime_type, "image/png");
        let decoded = image::load_from_memory(&req.image_bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 768));
    }

    #[test]
    fn empty_canvas_cannot_be_submitted() {
        let state = CanvasState::default();
        assert!(matches!(
            build_composition_request(&state, "x"),
            Err(CompositionError::CanvasUnsized)
        ));
    }

    #[test]
    fn reference_request_is_normalized() {
        let img = RgbaImage::from_pixel(3000, 1000, Rgba([1, 2, 3, 255]));
        let req = build_reference_request(&img, AspectRatio::Square.size(), Interpolation::Nearest, "ref").unwrap();
        let decoded = image::load_from_memory(&req.image_bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (1024, 1024));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(*decoded.get_pixel(512, 512), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn tracker_refuses_overlap_and_reverts_on_failure() {
        let mut t = SubmissionTracker::default();
        t.begin().unwrap();
        assert!(matches!(t.begin(), Err(SubmitError::Busy)));
        let err = t.finish(Err(GenerationError::Service("quota".into()))).unwrap_err();
        assert!(matches!(err, SubmitError::Generation(GenerationError::Service(_))));
        assert!(!t.is_busy());
        assert!(t.last_error.as_deref().is_some_and(|e| e.contains("quota")));

        t.begin().unwrap();
        let err = t.finish(Ok(GenerationOutput::default())).unwrap_err();
        assert!(matches!(err, SubmitError::Generation(GenerationError::EmptyResponse)));

        t.begin().unwrap();
        let ok = t.finish(Ok(GenerationOutput { image: None, text: Some("no image today".into()) }));
        assert!(ok.is_ok());
        assert!(t.last_error.is_none());
    }

    #[test]
    fn mock_service_sees_request() {
        let svc = MockService::new(|| Ok(GenerationOutput { image: None, text: Some("ok".into()) }));
        let req = GenerationRequest {
            prompt: "p".into(),
            image_bytes: vec![1],
            mime_type: PNG_MIME.into(),
            width: 1,
            height: 1,
        };
        assert!(svc.generate(&req).is_ok());
        assert_eq!(svc.calls.get(), 1);
        assert_eq!(svc.last.borrow().as_ref().map(|r| r.prompt.as_str()), Some("p"));
    }
}

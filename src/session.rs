use egui::Vec2;
use uuid::Uuid;

use crate::canvas::{BatchOutcome, CanvasState};
use crate::error::{GenerationError, SubmitError};
use crate::generation::{self, GenerationOutput, GenerationRequest, GenerationService, SubmissionTracker};
use crate::interaction::{InteractionController, PointerEvent, PointerPhase};
use crate::io::{self, ImageSource};
use crate::log_info;
use crate::settings::EditorSettings;

/// One independent editing session: a canvas, its gesture state and its
/// submission state.  Sessions share nothing.
pub struct EditorSession {
    pub id: Uuid,
    pub name: String,
    pub canvas: CanvasState,
    pub controller: InteractionController,
    pub submission: SubmissionTracker,
}

impl EditorSession {
    pub fn new_untitled(untitled_counter: usize, settings: EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            canvas: CanvasState::new(settings),
            controller: InteractionController::new(),
            submission: SubmissionTracker::default(),
        }
    }

    /// Decode a batch off-thread, then add every success as a layer in a
    /// single canvas update.
    pub async fn add_images(&mut self, sources: Vec<ImageSource>) -> BatchOutcome {
        let results = io::decode_batch(sources).await;
        let outcome = self.canvas.add_decoded(results);
        log_info!(
            "Session {}: {} layers added, {} files failed",
            self.name,
            outcome.added.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Feed one raw pointer event shown at `display_size`.
    pub fn handle_pointer(&mut self, event: &PointerEvent, display_size: Vec2) -> bool {
        match self.canvas.mapper(display_size) {
            Some(mapper) => self.controller.handle_event(&mut self.canvas, &mapper, event),
            None => match event.phase {
                PointerPhase::Up | PointerPhase::Cancel => self.controller.cancel(),
                PointerPhase::Down | PointerPhase::Move => false,
            },
        }
    }

    /// Drop every layer and any gesture in progress.
    pub fn clear(&mut self) {
        self.controller.cancel();
        self.canvas.clear();
    }

    // ---- generation --------------------------------------------------------

    /// Mark the session busy and build the request for the current canvas.
    /// Hosts that call the service asynchronously pair this with
    /// [`complete_submission`](Self::complete_submission).
    pub fn begin_submission(&mut self, user_prompt: &str) -> Result<GenerationRequest, SubmitError> {
        self.submission.begin()?;
        match generation::build_composition_request(&self.canvas, user_prompt) {
            Ok(request) => {
                log_info!(
                    "Session {}: submitting {}x{} ({} bytes)",
                    self.name, request.width, request.height, request.image_bytes.len()
                );
                Ok(request)
            }
            Err(e) => Err(self.submission.abort(e.into())),
        }
    }

    pub fn complete_submission(
        &mut self,
        result: Result<GenerationOutput, GenerationError>,
    ) -> Result<GenerationOutput, SubmitError> {
        self.submission.finish(result)
    }

    /// Flatten, call the service once, validate.  The layer stack is never
    /// touched, whatever the outcome.
    pub fn submit<S: GenerationService + ?Sized>(
        &mut self,
        service: &S,
        user_prompt: &str,
    ) -> Result<GenerationOutput, SubmitError> {
        let request = self.begin_submission(user_prompt)?;
        let result = service.generate(&request);
        self.complete_submission(result)
    }

    /// Bring a generated image back as a new layer through the normal
    /// decode path.  `None` if the output carried no image.
    pub async fn add_generated(&mut self, output: GenerationOutput, name: &str) -> Option<BatchOutcome> {
        let image = output.image?;
        Some(self.add_images(vec![image.into_source(name)]).await)
    }
}

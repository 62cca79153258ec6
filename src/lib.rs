//! Collage: a layer/canvas editing core.
//!
//! Decoded images become layers on a fixed-size logical canvas, are moved
//! and aspect-locked-resized by pointer gestures, and are flattened into an
//! exact-size PNG for an external image-generation service.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod coords;
pub mod error;
pub mod generation;
pub mod geometry;
pub mod interaction;
pub mod io;
pub mod layer;
pub mod renderer;
pub mod session;
pub mod settings;
pub mod stack;

pub use canvas::{AspectRatio, BatchOutcome, CanvasSize, CanvasState};
pub use coords::{CoordinateMapper, PointerInput};
pub use error::{CanvasError, CompositionError, DecodeError, GenerationError, InvalidGeometry, SubmitError};
pub use geometry::Handle;
pub use interaction::{Gesture, InteractionController, PointerEvent, PointerPhase};
pub use layer::{Layer, LayerId};
pub use session::EditorSession;
pub use settings::EditorSettings;
pub use stack::LayerStack;

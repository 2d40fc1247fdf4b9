pub mod canvas;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{Band, BandStacks, LayerKind, LayerStack, Placement};
pub use project::{BatchOutcome, ProcessError, Session};

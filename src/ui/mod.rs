// User interface module
// Terminal rendering of the shared space and keyboard input

pub mod input;
pub mod terminal;
pub mod widgets;

pub use input::{InputSource, KeyboardInput};
pub use widgets::SpaceView;

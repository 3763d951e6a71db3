pub mod library;
pub mod player;
pub mod window;

pub use library::{Animation, AnimationFrame, AnimationLibrary};
pub use player::SpritePlayer;
pub use window::SpriteWindow;

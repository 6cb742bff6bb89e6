mod composer;
mod input;

pub use composer::{Composer, ComposerEvent, ComposerTarget};
pub use input::{InputResult, TextInput};

mod command_overlay;
mod input;

pub use command_overlay::draw_input_overlay;
pub use input::{InputResult, TextInput};

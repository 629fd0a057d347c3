mod utils;

pub use utils::display_width;

pub mod category;
pub mod label_event;
pub mod picture;

pub use category::Category;
pub use label_event::{DuplicatePolicy, LabelEvent, LabelStats};
pub use picture::Picture;

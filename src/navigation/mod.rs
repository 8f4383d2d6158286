pub mod session;
pub mod view_mode;

pub use session::ReaderSession;
pub use view_mode::{UnknownViewMode, ViewMode};

pub mod cancel;
pub mod document;
pub mod export;
pub mod history;
pub mod layout;
pub mod notification;
pub mod panic_handler;
pub mod render;
pub mod session;
pub mod settings;
pub mod thumbnails;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cancel::CancelToken;
pub use document::{DocumentError, DocumentKind, DocumentSource, PageSize, open_document};
pub use layout::Surface;
pub use notification::{Notification, NotificationLevel};
pub use render::{Bitmap, NightMode, PageRenderer, Viewport};
pub use session::{FileInfo, SearchDirection, Session};
pub use view::{LayoutMode, ViewState};

pub mod annotations;
mod compose;
pub mod constants;
pub mod coords;
mod ops;
mod options;
mod render;
mod session;
mod source;
pub mod thumbnail;
mod tracker;
mod types;

pub use annotations::*;
pub use compose::composite;
pub use coords::{Point, oriented_size, to_pdf_space, to_ui_space};
pub use ops::*;
pub use options::*;
pub use session::{EditorSession, ExportJob};
pub use source::SourceDocument;
pub use thumbnail::{
    PageRasterizer, RasterImage, Thumbnail, ThumbnailImage, ThumbnailRenderer, Ticket,
};
pub use tracker::PageModificationTracker;
pub use types::*;

//! Page templates compiled once at startup.
//!
//! Every page under `pages/` is composed with the shared `base.html` layout
//! and every file under `partials/` into its own [`RenderUnit`]. The resulting
//! [`TemplateCache`] is immutable and is shared read-only between requests.

mod cache;
mod compiler;
mod error;
mod filters;
mod layout;
mod references;

pub use cache::{RenderUnit, TemplateCache};
pub use compiler::{CompositionStep, MERGE_ORDER, compile};
pub use error::{CompileError, TemplateError};
pub use layout::{
    BASE_LAYOUT_FILE, PAGES_DIR, PARTIALS_DIR, TEMPLATE_EXTENSION, TemplateFile, TemplateLayout,
};
pub use references::ReferenceKind;

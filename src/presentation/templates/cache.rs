use std::{collections::HashMap, fmt, io::Write};

use tera::{Context, Tera};

use super::error::TemplateError;

/// A fully linked page: its body, the base layout and every shared partial.
///
/// Rendering always starts from the page template; block overrides resolve
/// through the page's inheritance chain.
pub struct RenderUnit {
    name: String,
    tera: Tera,
}

impl RenderUnit {
    pub(super) fn new(name: String, tera: Tera) -> Self {
        Self { name, tera }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every template bound into this unit, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }

    pub fn render(&self, context: &Context) -> Result<String, TemplateError> {
        self.tera
            .render(&self.name, context)
            .map_err(|source| TemplateError::Render {
                page: self.name.clone(),
                source,
            })
    }

    /// Render into `out`, which may already hold bytes when an error is returned.
    pub fn render_to(&self, context: &Context, out: impl Write) -> Result<(), TemplateError> {
        self.tera
            .render_to(&self.name, context, out)
            .map_err(|source| TemplateError::Render {
                page: self.name.clone(),
                source,
            })
    }
}

impl fmt::Debug for RenderUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderUnit")
            .field("name", &self.name)
            .field("templates", &self.template_names())
            .finish()
    }
}

/// Page name to render unit, fixed for the life of the process.
///
/// There is no way to insert or remove entries after [`super::compile`]
/// returns, so concurrent readers need no synchronization.
#[derive(Debug)]
pub struct TemplateCache {
    units: HashMap<String, RenderUnit>,
}

impl TemplateCache {
    pub(super) fn new(units: HashMap<String, RenderUnit>) -> Self {
        Self { units }
    }

    /// Look up a page. A miss is a configuration fault, not a missing resource.
    pub fn get(&self, page: &str) -> Result<&RenderUnit, TemplateError> {
        self.units
            .get(page)
            .ok_or_else(|| TemplateError::cache_miss(page))
    }

    pub fn contains(&self, page: &str) -> bool {
        self.units.contains_key(page)
    }

    pub fn page_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

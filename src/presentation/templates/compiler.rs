use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
};

use tera::Tera;
use tracing::{debug, info};

use super::{
    cache::{RenderUnit, TemplateCache},
    error::{CompileError, TemplateError},
    filters,
    layout::{TemplateFile, TemplateLayout},
    references,
};

/// One stage of a page composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionStep {
    /// The shared layout that declares the named blocks.
    Base,
    /// Every shared partial, in file name order.
    Partials,
    /// The page body; applied last so its definitions take precedence.
    Page,
}

impl CompositionStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Partials => "partial",
            Self::Page => "page",
        }
    }
}

impl fmt::Display for CompositionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The order in which sources are merged into every render unit.
pub const MERGE_ORDER: [CompositionStep; 3] = [
    CompositionStep::Base,
    CompositionStep::Partials,
    CompositionStep::Page,
];

struct Source {
    name: String,
    text: String,
}

fn read_source(step: CompositionStep, file: &TemplateFile) -> Result<Source, CompileError> {
    let text = fs::read_to_string(&file.path).map_err(|source| CompileError::Read {
        step,
        path: file.path.clone(),
        source,
    })?;
    Ok(Source {
        name: file.name.clone(),
        text,
    })
}

/// Sources bound in merge order. Binding a name again replaces the earlier
/// source in place, so the last binding wins.
#[derive(Default)]
struct Composition<'a> {
    bound: Vec<(&'a str, &'a str)>,
}

impl<'a> Composition<'a> {
    fn bind(&mut self, step: CompositionStep, source: &'a Source) {
        match self
            .bound
            .iter_mut()
            .find(|(name, _)| *name == source.name)
        {
            Some(slot) => {
                debug!(
                    target = "snippetbox::templates",
                    template = %source.name,
                    step = %step,
                    "template redefined by later composition step"
                );
                slot.1 = source.text.as_str();
            }
            None => self
                .bound
                .push((source.name.as_str(), source.text.as_str())),
        }
    }

    /// Every literal `extends`, `import` and `include` must name a bound template.
    fn check_references(&self, page: &str) -> Result<(), CompileError> {
        let known: HashSet<&str> = self.bound.iter().map(|(name, _)| *name).collect();

        for (template, text) in &self.bound {
            for reference in references::scan(text) {
                let resolved = reference
                    .targets
                    .iter()
                    .any(|target| known.contains(target.as_str()));
                if resolved || reference.optional {
                    continue;
                }

                return Err(CompileError::UnresolvedReference {
                    page: page.to_string(),
                    template: (*template).to_string(),
                    kind: reference.kind,
                    target: reference.targets.join(", "),
                });
            }
        }

        Ok(())
    }

    fn link(self, page: &str) -> Result<RenderUnit, CompileError> {
        self.check_references(page)?;

        let mut tera = Tera::default();
        filters::register(&mut tera);
        tera.add_raw_templates(self.bound)
            .map_err(|source| CompileError::Parse {
                page: page.to_string(),
                source,
            })?;

        Ok(RenderUnit::new(page.to_string(), tera))
    }
}

/// Build the template cache from the tree described by `layout`.
///
/// Either every page compiles and the complete cache is returned, or the
/// first failure is returned and nothing is cached.
pub fn compile(layout: &TemplateLayout) -> Result<TemplateCache, TemplateError> {
    let pages = layout.discover_pages()?;
    let base = read_source(CompositionStep::Base, &layout.base())?;
    let partials = layout
        .discover_partials()?
        .iter()
        .map(|file| read_source(CompositionStep::Partials, file))
        .collect::<Result<Vec<_>, _>>()?;

    let mut units = HashMap::with_capacity(pages.len());
    for file in &pages {
        let page = read_source(CompositionStep::Page, file)?;

        let mut composition = Composition::default();
        for step in MERGE_ORDER {
            match step {
                CompositionStep::Base => composition.bind(step, &base),
                CompositionStep::Partials => {
                    for partial in &partials {
                        composition.bind(step, partial);
                    }
                }
                CompositionStep::Page => composition.bind(step, &page),
            }
        }

        let unit = composition.link(&page.name)?;
        debug!(
            target = "snippetbox::templates",
            page = %page.name,
            templates = unit.template_names().len(),
            "page compiled"
        );
        units.insert(page.name, unit);
    }

    info!(
        target = "snippetbox::templates",
        root = %layout.root().display(),
        pages = units.len(),
        partials = partials.len(),
        "template cache compiled"
    );

    Ok(TemplateCache::new(units))
}

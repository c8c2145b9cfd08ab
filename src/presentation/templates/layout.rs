use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::CompileError;

pub const BASE_LAYOUT_FILE: &str = "base.html";
pub const PARTIALS_DIR: &str = "partials";
pub const PAGES_DIR: &str = "pages";
pub const TEMPLATE_EXTENSION: &str = "html";

/// Directory convention for the template tree.
///
/// ```text
/// <root>/base.html
/// <root>/partials/*.html
/// <root>/pages/*.html
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    root: PathBuf,
}

/// A template source discovered on disk together with the name it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub name: String,
    pub path: PathBuf,
}

impl TemplateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base(&self) -> TemplateFile {
        TemplateFile {
            name: BASE_LAYOUT_FILE.to_string(),
            path: self.root.join(BASE_LAYOUT_FILE),
        }
    }

    pub fn partials_dir(&self) -> PathBuf {
        self.root.join(PARTIALS_DIR)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(PAGES_DIR)
    }

    /// Pages are bound under their bare file name, which is also the cache key.
    pub fn discover_pages(&self) -> Result<Vec<TemplateFile>, CompileError> {
        let dir = self.pages_dir();
        let pages = list_templates(&dir, |file_name| file_name.to_string())?;
        if pages.is_empty() {
            return Err(CompileError::NoPages { dir });
        }
        Ok(pages)
    }

    /// Partials are bound as `partials/<file name>`.
    pub fn discover_partials(&self) -> Result<Vec<TemplateFile>, CompileError> {
        list_templates(&self.partials_dir(), |file_name| {
            format!("{PARTIALS_DIR}/{file_name}")
        })
    }
}

/// Lists `*.html` files directly inside `dir`, sorted by file name.
fn list_templates(
    dir: &Path,
    bind_name: impl Fn(&str) -> String,
) -> Result<Vec<TemplateFile>, CompileError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| CompileError::Discover {
            dir: dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION) {
            continue;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CompileError::NonUtf8Name { path: path.clone() })?;

        files.push(TemplateFile {
            name: bind_name(file_name),
            path,
        });
    }

    Ok(files)
}

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

/// WordprocessingML main namespace
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub const DEFAULT_SECTIONS: [&str; 6] = [
    "Overview",
    "Project goals",
    "Team members and roles",
    "Methodology",
    "Key findings",
    "Conclusion and future work",
];

/// Ordered report sections, each filled independently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    sections: Vec<String>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            sections: DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template file not found: {0}")]
    NotFound(PathBuf),
    #[error("Unsupported template format: {0}")]
    Unsupported(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid docx document: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Template has no sections")]
    Empty,
}

impl Template {
    pub fn new(sections: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }

    /// Sections are separated by blank lines
    pub fn from_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        Self::new(
            normalized
                .split("\n\n")
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Loads a template, logging why it could not be used.
///
/// Returns `None` for missing, unreadable, empty or unsupported files so the
/// caller can fall back to [`Template::default`].
pub fn load_template(path: impl AsRef<Path>) -> Option<Template> {
    let path = path.as_ref();
    read_template(path)
        .inspect_err(|e| tracing::warn!(error = %e, path = ?path, "Failed to load template"))
        .ok()
}

#[tracing::instrument(skip_all, fields(path = ?path.as_ref()))]
pub fn read_template(path: impl AsRef<Path>) -> Result<Template, TemplateError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TemplateError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let template = match extension.as_str() {
        "txt" | "md" => Template::from_text(&std::fs::read_to_string(path)?),
        "docx" => read_docx_template(path)?,
        other => return Err(TemplateError::Unsupported(other.to_string())),
    };

    if template.is_empty() {
        return Err(TemplateError::Empty);
    }

    tracing::info!(sections = template.len(), "Loaded template");
    Ok(template)
}

fn read_docx_template(path: &Path) -> Result<Template, TemplateError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;

    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    parse_docx_sections(&xml)
}

/// Groups the document paragraphs into sections, a new section starting at
/// every paragraph styled `Heading*`
pub(crate) fn parse_docx_sections(xml: &str) -> Result<Template, TemplateError> {
    let doc = roxmltree::Document::parse(xml)?;

    let mut sections = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for paragraph in doc.descendants().filter(|n| n.has_tag_name((W_NS, "p"))) {
        if is_heading(&paragraph) && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }

        let text = paragraph
            .descendants()
            .filter(|n| n.has_tag_name((W_NS, "t")))
            .filter_map(|n| n.text())
            .collect::<String>();

        if !text.trim().is_empty() {
            current.push(text);
        }
    }

    if !current.is_empty() {
        sections.push(current.join("\n"));
    }

    Ok(Template::new(sections))
}

fn is_heading(paragraph: &roxmltree::Node) -> bool {
    paragraph
        .children()
        .find(|n| n.has_tag_name((W_NS, "pPr")))
        .and_then(|ppr| ppr.children().find(|n| n.has_tag_name((W_NS, "pStyle"))))
        .and_then(|style| style.attribute((W_NS, "val")))
        .is_some_and(|val| val.starts_with("Heading"))
}

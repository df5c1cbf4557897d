use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use printpdf::{BuiltinFont, Mm, PdfDocument};
use zip::{write::SimpleFileOptions, ZipWriter};

pub const DEFAULT_OUTPUT_DIR: &str = "reports";

// A4 portrait
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const BODY_FONT_SIZE: f32 = 11.0;
const HEADING_FONT_SIZE: f32 = 15.0;
const BODY_LINE_HEIGHT_MM: f32 = 5.5;
const HEADING_LINE_HEIGHT_MM: f32 = 8.0;
const LAYER_NAME: &str = "Layer 1";
/// Characters per line that fit the text width at the body font size
const MAX_LINE_CHARS: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Content written as-is
    PlainText,
    /// Paginated A4 PDF
    Pdf,
    /// Word document, one paragraph per line
    Docx,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0} (use md, pdf or docx)")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("DOCX error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "md",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "md" | "markdown" | "txt" => Ok(ExportFormat::PlainText),
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" | "docs" => Ok(ExportFormat::Docx),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `"Idea Pulse"` -> `"Idea_Pulse_report"`
pub fn report_filename(project_name: &str) -> String {
    format!("{}_report", project_name.trim().replace(' ', "_"))
}

/// Writes `content` to `<out_dir>/<filename>.<ext>` and returns that path.
///
/// PDFs use the builtin Helvetica faces, which only cover Latin text; use
/// [`export_with_font`] for anything else.
pub fn export(
    content: &str,
    filename: &str,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<PathBuf, ExportError> {
    export_with_font(content, filename, format, out_dir, None)
}

/// Like [`export`], embedding the TrueType/OpenType font at `pdf_font` into
/// PDF output. Other formats ignore the font.
#[tracing::instrument(skip(content), fields(bytes = content.len()))]
pub fn export_with_font(
    content: &str,
    filename: &str,
    format: ExportFormat,
    out_dir: &Path,
    pdf_font: Option<&Path>,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{filename}.{}", format.extension()));

    match format {
        ExportFormat::PlainText => std::fs::write(&path, content)?,
        ExportFormat::Pdf => write_pdf(content, filename, &path, pdf_font)?,
        ExportFormat::Docx => write_docx(content, filename, &path)?,
    }

    tracing::info!(path = ?path, "Exported report");
    Ok(path)
}

pub fn import_plain_text(path: &Path) -> Result<String, ExportError> {
    Ok(std::fs::read_to_string(path)?)
}

/// `"idea_pulse_report"` -> `"Idea Pulse Report"`
pub fn document_title(filename: &str) -> String {
    filename
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PdfLine {
    text: String,
    heading: bool,
}

/// Markdown headings become heading lines; everything else is wrapped body text
fn layout_lines(content: &str) -> Vec<PdfLine> {
    content
        .lines()
        .flat_map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                let text = trimmed.trim_start_matches('#').trim().to_string();
                vec![PdfLine {
                    text,
                    heading: true,
                }]
            } else {
                wrap_line(line, MAX_LINE_CHARS)
                    .into_iter()
                    .map(|text| PdfLine {
                        text,
                        heading: false,
                    })
                    .collect()
            }
        })
        .collect()
}

/// Greedy word wrap; words longer than `width` are hard split
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let mut word = word.chars().collect::<Vec<_>>();

        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn write_pdf(
    content: &str,
    title: &str,
    path: &Path,
    font_path: Option<&Path>,
) -> Result<(), ExportError> {
    let font_file = font_path.map(File::open).transpose()?;

    let (doc, first_page, first_layer) = PdfDocument::new(
        document_title(title),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME.to_string(),
    );

    // an embedded font has a single face; headings only differ in size
    let (body_font, heading_font) = match font_file {
        Some(font_file) => {
            let font = doc
                .add_external_font(font_file)
                .map_err(|e| ExportError::Pdf(e.to_string()))?;
            (font.clone(), font)
        }
        None => (
            doc.add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| ExportError::Pdf(e.to_string()))?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| ExportError::Pdf(e.to_string()))?,
        ),
    };

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut cursor = PAGE_HEIGHT_MM - MARGIN_MM;

    for line in layout_lines(content) {
        let (font, size, line_height) = if line.heading {
            (&heading_font, HEADING_FONT_SIZE, HEADING_LINE_HEIGHT_MM)
        } else {
            (&body_font, BODY_FONT_SIZE, BODY_LINE_HEIGHT_MM)
        };

        if cursor - line_height < MARGIN_MM {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
            layer = doc.get_page(page).get_layer(page_layer);
            cursor = PAGE_HEIGHT_MM - MARGIN_MM;
        }

        cursor -= line_height;
        if !line.text.is_empty() {
            layer.use_text(line.text, size, Mm(MARGIN_MM), Mm(cursor), font);
        }
    }

    doc.save(&mut BufWriter::new(File::create(path)?))
        .map_err(|e| ExportError::Pdf(e.to_string()))
}

fn write_docx(content: &str, title: &str, path: &Path) -> Result<(), ExportError> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS_XML.as_bytes())?;

    zip.start_file("word/_rels/document.xml.rels", options)?;
    zip.write_all(DOCUMENT_RELS_XML.as_bytes())?;

    zip.start_file("word/styles.xml", options)?;
    zip.write_all(STYLES_XML.as_bytes())?;

    zip.start_file("word/document.xml", options)?;
    zip.write_all(document_xml(&document_title(title), content).as_bytes())?;

    zip.finish()?;
    Ok(())
}

fn document_xml(title: &str, content: &str) -> String {
    let mut body = format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape_xml(title)
    );

    for line in content.lines() {
        body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape_xml(line)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // control characters are not allowed in XML 1.0
            c if c.is_control() && c != '\t' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;

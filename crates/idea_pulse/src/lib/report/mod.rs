//! # Report writer
//!
//! Fills a report template section by section. Every section is one pipeline
//! item going through a `retrieve` stage (reference passages from an
//! in-memory embedding index) and a `fill` stage (chat completion). Filled
//! sections are assembled in template order and exported as plain text, PDF
//! or DOCX.

pub mod export;
pub mod retriever;
pub mod template;
pub mod writer;

pub use export::{
    export, export_with_font, import_plain_text, report_filename, ExportError, ExportFormat,
};
pub use retriever::{EmbeddingIndex, Retriever};
pub use template::{load_template, read_template, Template, TemplateError};
pub use writer::{ProjectInfo, Report, ReportWriter};

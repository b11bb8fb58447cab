//! Store - DOCX package persistence
//!
//! This crate opens and saves Word documents: the OPC package layer, the
//! content-type and relationship resolver, the part codecs that map XML to
//! the [`doc_model`] types and back, and engine options.

pub mod docx;
pub mod options;

pub use docx::{
    decode, encode, DecodedDocument, DocumentWriter, DocxDocument, DocxError, DocxResult, Package, PackageGraph,
    PartName, ValidationReport, ValidationWarning, WarningKind,
};
pub use options::{Compression, EngineOptions, OpenOptions, SaveOptions, StyleOptions};

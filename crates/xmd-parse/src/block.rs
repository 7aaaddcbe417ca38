//! The `Block` record emitted by the tokenizer (C2): a line-offset-preserving
//! segmentation of normalized XMD source, ahead of any IR construction.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub start_offset: usize,
    pub end_offset: usize,
    pub block_index: usize,
    /// The verbatim source text spanned by this block, kept for lossless
    /// fallback (`RawXmdBlock`) and for figure/directive attribute capture.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Author(String),
    Date(String),
    Title(String),
    Heading { level: u8, text: String },
    CodeFence { language: Option<String>, code: String },
    MathBlock { latex: String },
    Directive { name: Option<String>, args: String, body: String },
    List { ordered: bool, items: Vec<String> },
    Figure { alt: String, url: String, attrs_raw: Option<String> },
    Paragraph(String),
    Raw(String),
}

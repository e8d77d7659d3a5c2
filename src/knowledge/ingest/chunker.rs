//! Heading-aware chunking of long-form documents.
//!
//! Every chunk starts with a `DOCUMENT: <title>` line so a chunk retrieved on its
//! own still says where it came from. Sizes are counted in characters.

use regex::Regex;

use crate::knowledge::core::config::ChunkingConfig;
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};

/// Header line prepended to every chunk of a document.
#[must_use]
pub fn document_header(title: &str) -> String {
    format!("DOCUMENT: {title}\n\n")
}

/// Splits documents into overlapping, self-describing passages.
#[derive(Clone, Debug)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    merge_sections: bool,
    heading: Regex,
}

impl Chunker {
    /// Create a chunker from config.
    ///
    /// # Errors
    /// Returns an error if the sizes are inconsistent.
    pub fn new(config: &ChunkingConfig) -> KnowledgeResult<Self> {
        if config.chunk_size == 0 || config.overlap >= config.chunk_size {
            return Err(KnowledgeError::InvalidConfig(
                "chunking requires 0 <= overlap < chunk_size".to_string(),
            ));
        }
        let heading = Regex::new(r"(?m)^#{1,6}(?:[ \t]|$)")
            .map_err(|err| KnowledgeError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            merge_sections: config.merge_sections,
            heading,
        })
    }

    /// Split `body` before every markdown heading line. Always yields at least one section.
    #[must_use]
    pub fn split_sections<'a>(&self, body: &'a str) -> Vec<&'a str> {
        let mut sections = Vec::new();
        let mut start = 0;
        for found in self.heading.find_iter(body) {
            if found.start() > start {
                sections.push(&body[start..found.start()]);
                start = found.start();
            }
        }
        sections.push(&body[start..]);
        sections
    }

    /// Chunk a document.
    #[must_use]
    pub fn chunk(&self, title: &str, body: &str) -> Vec<String> {
        let header = document_header(title);
        let header_len = header.chars().count();
        let mut chunks: Vec<String> = Vec::new();
        let mut acc = String::new();
        let mut acc_len = 0;

        for section in self.split_sections(body) {
            let section_len = section.chars().count();
            let fits = header_len + acc_len + section_len <= self.chunk_size;
            let may_join = self.merge_sections || acc.trim().is_empty();
            if fits && may_join {
                acc.push_str(section);
                acc_len += section_len;
                continue;
            }

            // Whitespace-only leftovers are carried into the next section.
            let mut text = std::mem::take(&mut acc);
            if !text.trim().is_empty() {
                chunks.push(format!("{header}{text}"));
                text.clear();
            }
            text.push_str(section);
            let text_len = text.chars().count();

            if header_len + text_len <= self.chunk_size {
                acc = text;
                acc_len = text_len;
            } else {
                self.force_split(&header, &text, &mut chunks);
                acc_len = 0;
            }
        }

        if !acc.trim().is_empty() || chunks.is_empty() {
            let last = format!("{header}{acc}");
            if !chunks.contains(&last) {
                chunks.push(last);
            }
        }

        chunks
    }

    /// Cut an oversized section into windows that overlap by `overlap` characters.
    fn force_split(&self, header: &str, text: &str, chunks: &mut Vec<String>) {
        let header_len = header.chars().count();
        let width = self
            .chunk_size
            .saturating_sub(header_len)
            .max(self.overlap + 1);
        let step = width - self.overlap;
        let chars: Vec<char> = text.chars().collect();

        let mut start = 0;
        loop {
            let end = (start + width).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            chunks.push(format!("{header}{window}"));
            start += step;
            if chars.len().saturating_sub(start) <= self.overlap {
                break;
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{default_chunk_headers, HeaderMarker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: usize,
    pub name: String,
    pub text: String,
}

/// A unit of retrieval: a section's text with its heading lines kept in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
    pub headers: Vec<Heading>,
}

impl Chunk {
    /// Heading hierarchy keyed by marker name, e.g. `"Header 2" -> "Methods"`.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .map(|h| (h.name.clone(), h.text.clone()))
            .collect()
    }

    pub fn heading_path(&self) -> String {
        self.headers
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

struct Section {
    headers: Vec<Heading>,
    lines: Vec<String>,
    heading_only: bool,
}

pub struct MarkdownHeaderSplitter {
    headers: Vec<HeaderMarker>,
}

impl Default for MarkdownHeaderSplitter {
    fn default() -> Self {
        Self::new(default_chunk_headers())
    }
}

impl MarkdownHeaderSplitter {
    pub fn new(mut headers: Vec<HeaderMarker>) -> Self {
        // Longest marker first so "##" is never read as "#"
        headers.sort_by(|a, b| b.marker.len().cmp(&a.marker.len()));
        Self { headers }
    }

    pub fn split_text(&self, text: &str) -> Vec<Chunk> {
        let mut sections: Vec<Section> = Vec::new();
        let mut stack: Vec<Heading> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_is_heading = false;
        let mut fence: Option<&str> = None;

        for raw in text.lines() {
            let line = raw.trim();

            if let Some(open) = fence {
                if line.starts_with(open) {
                    fence = None;
                }
                current.push(raw.trim_end().to_string());
                current_is_heading = false;
                continue;
            }

            if line.starts_with("```") || line.starts_with("~~~") {
                fence = Some(&line[..3]);
                current.push(line.to_string());
                current_is_heading = false;
                continue;
            }

            if let Some(marker) = self.match_header(line) {
                flush(&mut sections, &stack, &mut current, current_is_heading);

                let level = marker.level();
                while stack.last().map_or(false, |h| h.level >= level) {
                    stack.pop();
                }
                stack.push(Heading {
                    level,
                    name: marker.name.clone(),
                    text: line[marker.marker.len()..].trim().to_string(),
                });

                current.push(line.to_string());
                current_is_heading = true;
                continue;
            }

            if line.is_empty() {
                if current.last().map_or(false, |l| !l.is_empty()) {
                    current.push(String::new());
                }
            } else {
                current.push(line.to_string());
                current_is_heading = false;
            }
        }
        flush(&mut sections, &stack, &mut current, current_is_heading);

        merge_heading_only(sections)
            .into_iter()
            .enumerate()
            .map(|(index, section)| Chunk {
                index,
                content: section.lines.join("\n"),
                headers: section.headers,
            })
            .collect()
    }

    fn match_header(&self, line: &str) -> Option<&HeaderMarker> {
        self.headers.iter().find(|h| {
            line.starts_with(h.marker.as_str())
                && (line.len() == h.marker.len() || line[h.marker.len()..].starts_with(' '))
        })
    }
}

fn flush(sections: &mut Vec<Section>, stack: &[Heading], current: &mut Vec<String>, heading_only: bool) {
    while current.last().map_or(false, |l| l.is_empty()) {
        current.pop();
    }
    if current.is_empty() {
        return;
    }

    sections.push(Section {
        headers: stack.to_vec(),
        lines: std::mem::take(current),
        heading_only,
    });
}

/// Fold a section that is only a heading line into the sub-section that follows it.
fn merge_heading_only(sections: Vec<Section>) -> Vec<Section> {
    let mut merged: Vec<Section> = Vec::with_capacity(sections.len());

    for section in sections {
        if let Some(last) = merged.last_mut() {
            let deeper = section.headers.len() > last.headers.len()
                && section.headers.starts_with(&last.headers);
            if last.heading_only && deeper {
                last.lines.push(String::new());
                last.lines.extend(section.lines);
                last.headers = section.headers;
                last.heading_only = section.heading_only;
                continue;
            }
        }
        merged.push(section);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<Chunk> {
        MarkdownHeaderSplitter::default().split_text(text)
    }

    fn non_blank_lines(text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn splits_on_headings_and_keeps_them() {
        let chunks = split("# Intro\n\nHello there.\n\n## Setup\n\nInstall it.\n\n# Usage\n\nRun it.");
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].content, "# Intro\n\nHello there.");
        assert_eq!(chunks[0].metadata().get("Header 1").map(String::as_str), Some("Intro"));

        assert_eq!(chunks[1].content, "## Setup\n\nInstall it.");
        assert_eq!(chunks[1].heading_path(), "Intro > Setup");

        assert_eq!(chunks[2].content, "# Usage\n\nRun it.");
        assert_eq!(chunks[2].headers.len(), 1);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn new_heading_closes_deeper_levels() {
        let chunks = split("# A\nx\n## B\ny\n### C\nz\n## D\nw");
        let last = chunks.last().unwrap();
        assert_eq!(last.heading_path(), "A > D");
        assert!(last.metadata().get("Header 3").is_none());
    }

    #[test]
    fn preamble_and_headingless_text_have_empty_metadata() {
        let chunks = split("Some preface.\n\n# Title\nBody");
        assert_eq!(chunks[0].content, "Some preface.");
        assert!(chunks[0].headers.is_empty());

        let chunks = split("just text\nmore text");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].headers.is_empty());
        assert_eq!(chunks[0].content, "just text\nmore text");
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(split("").is_empty());
        assert!(split("  \n\n\t\n").is_empty());
    }

    #[test]
    fn heading_only_section_merges_into_subsection() {
        let chunks = split("# Guide\n## Part one\nText one\n## Part two\nText two");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "# Guide\n\n## Part one\nText one");
        assert_eq!(chunks[0].heading_path(), "Guide > Part one");
        assert_eq!(chunks[1].heading_path(), "Guide > Part two");
    }

    #[test]
    fn deeper_markers_and_code_fences_are_not_split() {
        let text = "# Code\n```\n# not a heading\n```\n#### Minor\ntext";
        let chunks = split(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("# not a heading"));
        assert!(chunks[0].content.contains("#### Minor"));
    }

    #[test]
    fn hashtag_without_space_is_body_text() {
        let chunks = split("#rust is fun\n# Real\nbody");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].headers.is_empty());
    }

    #[test]
    fn chunks_cover_every_line_in_order() {
        let text = "intro line\n\n# One\npara a\n\npara b\n## Two\n\n### Three\nleaf\n# Four\n\nend\n";
        let chunks = split(text);
        let joined = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
        assert_eq!(non_blank_lines(&joined), non_blank_lines(text));
    }

    #[test]
    fn custom_markers_only_split_configured_levels() {
        let splitter = MarkdownHeaderSplitter::new(vec![HeaderMarker::new("#", "Header 1")]);
        let chunks = splitter.split_text("# A\n## B\ntext");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "# A\n## B\ntext");
    }
}

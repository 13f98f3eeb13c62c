//! Section structure builder: recover numbered sections from page text.
//!
//! Research papers number their headings (`1 Introduction`, `2.3 Training`),
//! and that numbering survives text extraction even when fonts and layout do
//! not. Each non-blank line is classified against two patterns:
//!
//! | Pattern | Example | Result |
//! |---------|---------|--------|
//! | `N.M Title` | `1.2 Related Work` | subsection `1.2` of section `1` |
//! | `N Title`   | `3 Method`         | section `3` |
//!
//! The title must start with an upper-case letter, which rejects numbered
//! list items and stray figures (`2 of the samples…`). Documents with
//! lower-case or non-Latin headings produce no sections at all.
//!
//! Lines are folded through a [`SectionTreeBuilder`] that tracks the active
//! section/subsection across page boundaries. Lines before the first heading
//! (title block, abstract) are dropped.

use crate::pipeline::extract::PageTexts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static RE_SUBSECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\s+([A-Z].*)$").unwrap());

static RE_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s+([A-Z].*)$").unwrap());

// ── Tree types ───────────────────────────────────────────────────────────

/// Sections of one document, in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTree {
    pub sections: Vec<Section>,
}

/// A top-level numbered section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Numeral, e.g. `"3"`.
    pub id: String,
    /// Empty when only subsections of this section were seen.
    pub title: String,
    /// Page the section was first seen on.
    pub page: usize,
    /// Every line of the section, its subsections included, each ending in `\n`.
    pub full_text: String,
    pub subsections: Vec<Subsection>,
}

/// A second-level numbered section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    /// Dotted numeral, e.g. `"3.2"`.
    pub id: String,
    pub title: String,
    pub page: usize,
    pub text: String,
}

impl SectionTree {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Section ids in first-appearance order.
    pub fn ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }

    /// Flatten into summarization units: each section, then its subsections.
    pub fn units(&self) -> Vec<SummaryUnit> {
        let mut units = Vec::new();
        for section in &self.sections {
            units.push(SummaryUnit {
                kind: UnitKind::Section,
                id: section.id.clone(),
                title: section.display_title(),
                page: section.page,
                text: section.full_text.clone(),
            });
            for sub in &section.subsections {
                units.push(SummaryUnit {
                    kind: UnitKind::Subsection,
                    id: sub.id.clone(),
                    title: format!("{} {}", sub.id, sub.title),
                    page: sub.page,
                    text: sub.text.clone(),
                });
            }
        }
        units
    }
}

impl Section {
    fn implicit(id: &str, page: usize) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            page,
            full_text: String::new(),
            subsections: Vec::new(),
        }
    }

    pub fn subsection(&self, id: &str) -> Option<&Subsection> {
        self.subsections.iter().find(|s| s.id == id)
    }

    fn subsection_mut(&mut self, id: &str) -> Option<&mut Subsection> {
        self.subsections.iter_mut().find(|s| s.id == id)
    }

    /// Heading title, or the bare numeral when the heading was never seen.
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            self.id.clone()
        } else {
            self.title.clone()
        }
    }
}

/// One summarization input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryUnit {
    pub kind: UnitKind,
    pub id: String,
    /// Title recorded with the summary; subsections carry their numeral.
    pub title: String,
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Section,
    Subsection,
}

// ── Classification ───────────────────────────────────────────────────────

/// What a single trimmed, non-blank line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Subsection {
        parent: &'a str,
        id: &'a str,
        title: &'a str,
    },
    Section {
        id: &'a str,
        title: &'a str,
    },
    Body,
}

/// Classify a line; the subsection pattern wins over the section pattern.
pub fn classify_line(line: &str) -> LineKind<'_> {
    if let Some(caps) = RE_SUBSECTION.captures(line) {
        let parent = caps.get(1).map_or("", |m| m.as_str());
        let minor_end = caps.get(2).map_or(0, |m| m.end());
        return LineKind::Subsection {
            parent,
            id: &line[..minor_end],
            title: caps.get(3).map_or("", |m| m.as_str().trim()),
        };
    }
    if let Some(caps) = RE_SECTION.captures(line) {
        return LineKind::Section {
            id: caps.get(1).map_or("", |m| m.as_str()),
            title: caps.get(2).map_or("", |m| m.as_str().trim()),
        };
    }
    LineKind::Body
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Accumulator folded over the document's lines.
///
/// The active section/subsection persist across page boundaries and are
/// owned by one builder, so concurrent extractions never share state.
#[derive(Debug, Default)]
pub struct SectionTreeBuilder {
    tree: SectionTree,
    current_section: Option<String>,
    current_subsection: Option<String>,
    dropped_lines: usize,
}

impl SectionTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one raw line from `page`.
    pub fn push_line(mut self, page: usize, raw: &str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            return self;
        }

        match classify_line(line) {
            LineKind::Subsection { parent, id, title } => {
                self.open_subsection(page, parent, id, title, line)
            }
            LineKind::Section { id, title } => self.open_section(page, id, title, line),
            LineKind::Body => self.append_body(line),
        }
        self
    }

    /// Consume every line of a page.
    pub fn push_page(self, page: usize, text: &str) -> Self {
        text.lines().fold(self, |b, line| b.push_line(page, line))
    }

    pub fn finish(self) -> SectionTree {
        debug!(
            "Section builder: {} sections, {} pre-heading lines dropped",
            self.tree.len(),
            self.dropped_lines
        );
        self.tree
    }

    fn ensure_section(&mut self, id: &str, page: usize) -> &mut Section {
        let idx = match self.tree.sections.iter().position(|s| s.id == id) {
            Some(idx) => idx,
            None => {
                self.tree.sections.push(Section::implicit(id, page));
                self.tree.sections.len() - 1
            }
        };
        &mut self.tree.sections[idx]
    }

    fn open_subsection(&mut self, page: usize, parent: &str, id: &str, title: &str, line: &str) {
        let section = self.ensure_section(parent, page);
        if section.subsection(id).is_none() {
            section.subsections.push(Subsection {
                id: id.to_string(),
                title: title.to_string(),
                page,
                text: String::new(),
            });
        }
        push_line_to(&mut section.full_text, line);
        if let Some(sub) = section.subsection_mut(id) {
            push_line_to(&mut sub.text, line);
        }
        self.current_section = Some(parent.to_string());
        self.current_subsection = Some(id.to_string());
    }

    fn open_section(&mut self, page: usize, id: &str, title: &str, line: &str) {
        let section = self.ensure_section(id, page);
        // Keep the first sighting; only an implicit parent adopts this heading.
        if section.title.is_empty() {
            section.title = title.to_string();
            section.page = page;
        }
        push_line_to(&mut section.full_text, line);
        self.current_section = Some(id.to_string());
        self.current_subsection = None;
    }

    fn append_body(&mut self, line: &str) {
        let Some(section_id) = self.current_section.clone() else {
            self.dropped_lines += 1;
            return;
        };
        let subsection_id = self.current_subsection.clone();
        let Some(section) = self.tree.get_mut(&section_id) else {
            return;
        };
        push_line_to(&mut section.full_text, line);
        if let Some(sub_id) = subsection_id {
            if let Some(sub) = section.subsection_mut(&sub_id) {
                push_line_to(&mut sub.text, line);
            }
        }
    }
}

fn push_line_to(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

/// Build the section tree from page texts in ascending page order.
pub fn build_sections(pages: &PageTexts) -> SectionTree {
    pages
        .iter()
        .fold(SectionTreeBuilder::new(), |b, (page, text)| {
            b.push_page(*page, text)
        })
        .finish()
}

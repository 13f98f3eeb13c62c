//! Prompts sent to the summarization model.
//!
//! Callers can override both templates via
//! [`crate::config::DigestConfig::unit_prompt`] and
//! [`crate::config::DigestConfig::document_prompt`]; the constants here are
//! used only when no override is provided.

/// Default per-unit instruction. `{text}` is replaced by the section text.
pub const DEFAULT_UNIT_PROMPT: &str = r#"Please provide a concise summary of the following research paper section in at most 2 sentences.
Focus on the main points and key findings. Reply with the summary text only.

{text}

Summary:"#;

/// Default whole-document instruction. `{document}` is replaced by the paged text.
pub const DEFAULT_DOCUMENT_PROMPT: &str = r#"I want you to act as a research paper summarizer. Your task is to identify section titles and
create concise 2-line summaries for each section from the following research paper. Focus on the main points and key findings.

{document}

Please analyze the entire document and provide a summary of the research paper.
Identify all section titles, their page numbers, and provide a 2-line summary for each section.
Format your response as a JSON array with objects containing "Section Title", "Summary", and "page_no" fields.
IMPORTANT: Provide ONLY the JSON array without any markdown formatting, explanation, or code blocks.
Example format:
[
    {
        "Section Title": "1. Introduction",
        "Summary": "Introduces the research problem, background, and motivation.",
        "page_no": 1
    }
]"#;

/// Opening system turn for page-by-page delivery.
pub const PAGE_BY_PAGE_SYSTEM: &str = "You will receive a research paper one page at a time. \
Each page starts with a marker line such as '--- PAGE 3 ---'. \
Acknowledge each page with a single word and wait for the final instruction.";

/// Stands in for `{document}` in the final page-by-page request.
pub const PAGES_SENT_ABOVE: &str = "(The paper was sent above, one page per message.)";

/// Marker prefixed to each page's text.
pub fn page_marker(page_num: usize) -> String {
    format!("--- PAGE {page_num} ---")
}

/// Concatenate pages with their markers, in ascending page order.
pub fn paged_document<'a>(pages: impl IntoIterator<Item = (usize, &'a str)>) -> String {
    let mut doc = String::new();
    for (page_num, text) in pages {
        doc.push_str("\n\n");
        doc.push_str(&page_marker(page_num));
        doc.push_str("\n\n");
        doc.push_str(text);
    }
    doc
}

/// Render the per-unit prompt.
pub fn unit_prompt(template: Option<&str>, text: &str) -> String {
    template.unwrap_or(DEFAULT_UNIT_PROMPT).replace("{text}", text)
}

/// Render the whole-document prompt.
pub fn document_prompt(template: Option<&str>, document: &str) -> String {
    template
        .unwrap_or(DEFAULT_DOCUMENT_PROMPT)
        .replace("{document}", document)
}

/// One page turn for page-by-page delivery.
pub fn page_turn(page_num: usize, text: &str) -> String {
    format!("{}\n\n{}", page_marker(page_num), text)
}

/// Closing request for page-by-page delivery.
pub fn final_request(template: Option<&str>) -> String {
    document_prompt(template, PAGES_SENT_ABOVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_document_prefixes_markers() {
        let doc = paged_document([(1, "alpha"), (3, "gamma")]);
        assert_eq!(doc, "\n\n--- PAGE 1 ---\n\nalpha\n\n--- PAGE 3 ---\n\ngamma");
    }

    #[test]
    fn unit_prompt_embeds_text() {
        let p = unit_prompt(None, "1 Introduction\nWe study X.");
        assert!(p.contains("1 Introduction\nWe study X."));
        assert!(p.contains("2 sentences"));
        assert!(!p.contains("{text}"));
    }

    #[test]
    fn document_prompt_keeps_literal_braces() {
        let p = document_prompt(None, "BODY");
        assert!(p.contains("BODY"));
        assert!(p.contains("\"page_no\": 1"));
        assert!(p.contains("    {\n"));
    }

    #[test]
    fn page_turn_and_final_request() {
        assert_eq!(page_turn(2, "beta"), "--- PAGE 2 ---\n\nbeta");
        let last = final_request(None);
        assert!(last.contains(PAGES_SENT_ABOVE));
        assert!(last.contains("JSON array"));
    }

    #[test]
    fn custom_template_is_used() {
        assert_eq!(unit_prompt(Some("TL;DR: {text}"), "abc"), "TL;DR: abc");
    }
}

use super::{Draft, special_drafts};
use crate::chunk::ChunkContent;
use crate::section::Section;
use crate::split::split_prose;

/// One chunk per paragraph. A heading merges into the first chunk of its paragraph
/// only; a heading with nothing after it becomes a `SECTION` chunk.
pub(super) fn drafts(sections: &[Section], max_tokens: usize) -> Vec<Draft> {
    let mut drafts = Vec::new();
    for section in sections {
        let content = match section {
            Section::Heading { .. } => ChunkContent::Section,
            Section::Paragraph { .. } => ChunkContent::Paragraph,
            _ => {
                drafts.extend(special_drafts(section, max_tokens));
                continue;
            }
        };
        let Some(body) = section.body() else {
            continue;
        };
        drafts.extend(split_prose(&body, max_tokens).into_iter().map(|text| Draft {
            content: content.clone(),
            text,
        }));
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use crate::tokens::estimate_tokens;

    #[test]
    fn heading_goes_on_first_paragraph_only() {
        let sections = vec![
            Section::Paragraph {
                heading: Some("Intro".into()),
                text: "P1".into(),
            },
            Section::paragraph("P2"),
        ];
        let out = drafts(&sections, 1024);
        assert_eq!(out.len(), 2);
        assert!(out[0].text.contains("Intro") && out[0].text.contains("P1"));
        assert_eq!(out[1].text, "P2");
    }

    #[test]
    fn lone_heading_is_section_kind() {
        let out = drafts(
            &[Section::Heading {
                text: "Summary".into(),
                level: 2,
            }],
            1024,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "Summary");
        assert_eq!(out[0].content.kind(), ChunkKind::Section);
    }

    #[test]
    fn image_then_paragraph_keeps_order() {
        let out = drafts(&[Section::image("a.png"), Section::paragraph("text")], 1024);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content.kind(), ChunkKind::Image);
        assert_eq!(out[0].content.filename(), Some("a.png"));
        assert_eq!(out[1].content.kind(), ChunkKind::Paragraph);
    }

    #[test]
    fn long_paragraph_splits_with_heading_on_first_piece() {
        let text = "A complete sentence lives here. ".repeat(40);
        let out = drafts(
            &[Section::Paragraph {
                heading: Some("Long".into()),
                text,
            }],
            64,
        );
        assert!(out.len() > 1);
        assert!(out[0].text.starts_with("Long"));
        assert!(out[1..].iter().all(|d| !d.text.contains("Long")));
        assert!(out.iter().all(|d| estimate_tokens(&d.text) <= 64));
        assert!(out.iter().all(|d| d.content.kind() == ChunkKind::Paragraph));
    }
}

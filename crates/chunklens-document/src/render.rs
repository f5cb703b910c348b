use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::structure::basename;

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\bsrc\s*=\s*)("([^"]*)"|'([^']*)')"#).unwrap()
});

fn is_absolute(src: &str) -> bool {
    src.contains("://") || src.starts_with("//") || src.starts_with("data:")
}

/// Rewrite relative `<img src>` references to the fully-qualified URL in `images`
/// whose basename matches. Unmatched and absolute references are left unchanged.
#[must_use]
pub fn resolve_image_sources(html: &str, images: &[String]) -> String {
    if images.is_empty() {
        return html.to_owned();
    }
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    for url in images {
        by_name.entry(basename(url)).or_insert(url.as_str());
    }

    IMG_SRC
        .replace_all(html, |caps: &Captures<'_>| {
            let src = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            match by_name.get(basename(src)) {
                Some(url) if !is_absolute(src) && !src.is_empty() => {
                    format!("{}\"{url}\"", &caps[1])
                }
                _ => caps[0].to_owned(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_matching_relative_sources() {
        let html = r#"<p><img src="images/chart.png" alt="c"></p><img class="x" src='../b.jpg'>"#;
        let images = vec![
            "https://cdn.example.com/doc/42/chart.png".to_owned(),
            "https://cdn.example.com/doc/42/b.jpg".to_owned(),
        ];
        let out = resolve_image_sources(html, &images);
        assert!(out.contains(r#"src="https://cdn.example.com/doc/42/chart.png""#));
        assert!(out.contains(r#"src="https://cdn.example.com/doc/42/b.jpg""#));
        assert!(out.contains(r#"alt="c""#));
    }

    #[test]
    fn leaves_unmatched_and_absolute_sources() {
        let html = r#"<img src="other.png"><img src="https://elsewhere.org/chart.png">"#;
        let images = vec!["https://cdn.example.com/chart.png".to_owned()];
        assert_eq!(resolve_image_sources(html, &images), html);
    }

    #[test]
    fn no_images_is_identity() {
        assert_eq!(resolve_image_sources("<img src=\"a.png\">", &[]), "<img src=\"a.png\">");
    }
}

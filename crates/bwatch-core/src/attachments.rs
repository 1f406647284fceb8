//! Attachment resolution for one bulletin.
//!
//! The structured descriptor list wins when present. Otherwise the body is
//! scanned for anchor links, but only when it mentions the attachment
//! marker at all — most bulletins carry no documents and skip the scan.

use regex::Regex;

use crate::{
    domain::{AttachmentRef, Bulletin},
    links,
};

/// Case-insensitive marker indicating the body references an attachment.
const ATTACHMENT_MARKER: &str = "allegato";

const CANONICAL_EXTENSION: &str = ".pdf";

pub fn resolve(bulletin: &Bulletin) -> Vec<AttachmentRef> {
    if !bulletin.attachments.is_empty() {
        return bulletin.attachments.clone();
    }

    if !bulletin.body.to_lowercase().contains(ATTACHMENT_MARKER) {
        return Vec::new();
    }

    let id_param = Regex::new(r"allegato_id=(\d+)").expect("valid regex");

    let mut out = Vec::new();
    for link in links::extract_links(&bulletin.body) {
        // a link without the id pattern is skipped, never fatal
        let Some(caps) = id_param.captures(&link.href) else {
            continue;
        };
        let id = caps[1].to_string();

        let name = link.text.trim();
        let filename = if name.is_empty() {
            format!("allegato_{id}{CANONICAL_EXTENSION}")
        } else {
            ensure_extension(name)
        };

        out.push(AttachmentRef { id, filename });
    }
    out
}

fn ensure_extension(name: &str) -> String {
    if name.to_lowercase().ends_with(CANONICAL_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{CANONICAL_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulletin(body: &str, attachments: Vec<AttachmentRef>) -> Bulletin {
        Bulletin {
            id: "1".to_string(),
            title: String::new(),
            date: String::new(),
            body: body.to_string(),
            read: false,
            attachments,
        }
    }

    #[test]
    fn structured_list_takes_priority_over_body_links() {
        let structured = vec![AttachmentRef {
            id: "9".to_string(),
            filename: "circ.pdf".to_string(),
        }];
        let b = bulletin(
            r#"allegato: <a href="x?allegato_id=42">other</a>"#,
            structured.clone(),
        );
        assert_eq!(resolve(&b), structured);
    }

    #[test]
    fn body_without_marker_yields_nothing() {
        let b = bulletin(r#"<a href="x?id=42">documento</a>"#, Vec::new());
        assert!(resolve(&b).is_empty());
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let b = bulletin(r#"In ALLEGATO: <a href="x?allegato_id=42">doc</a>"#, Vec::new());
        assert_eq!(resolve(&b).len(), 1);
    }

    #[test]
    fn malformed_link_is_skipped_without_aborting_the_scan() {
        let b = bulletin(
            r#"allegato <a href="x?allegato_id=42">Circolare 12</a> e
               <a href="x?download=yes">broken</a>"#,
            Vec::new(),
        );
        let refs = resolve(&b);
        assert_eq!(
            refs,
            vec![AttachmentRef {
                id: "42".to_string(),
                filename: "Circolare 12.pdf".to_string(),
            }]
        );
    }

    #[test]
    fn empty_display_text_synthesizes_filename_from_id() {
        let b = bulletin(r#"allegato <a href="x?allegato_id=7"></a>"#, Vec::new());
        assert_eq!(resolve(&b)[0].filename, "allegato_7.pdf");
    }

    #[test]
    fn existing_extension_is_not_doubled() {
        let b = bulletin(r#"allegato <a href="x?allegato_id=7">nota.PDF</a>"#, Vec::new());
        assert_eq!(resolve(&b)[0].filename, "nota.PDF");
    }
}

//! Anchor-based shader composition.
//!
//! A base shader declares named insertion points as marker lines
//! (`//@anchor(name)`). The template is parsed once into an ordered list of
//! text spans and anchors; callers register code fragments against anchor
//! names, and composition walks the list deterministically: template order
//! first, registration order within an anchor. Misaddressed fragments and
//! duplicate anchors are errors, not silent no-ops.

use thiserror::Error;

const ANCHOR_PREFIX: &str = "//@anchor(";
const ANCHOR_SUFFIX: &str = ")";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("shader '{template}' declares anchor '{anchor}' twice")]
    DuplicateAnchor { template: String, anchor: String },
    #[error("shader '{template}' has malformed anchor marker: '{line}'")]
    MalformedAnchor { template: String, line: String },
    #[error("fragment targets unknown anchor '{anchor}' in shader '{template}'")]
    UnknownAnchor { template: String, anchor: String },
}

enum Span {
    Text(String),
    Anchor(String),
}

/// A parsed base shader with named insertion points.
pub struct ShaderTemplate {
    label: String,
    spans: Vec<Span>,
}

impl ShaderTemplate {
    /// Parses `source`, treating each `//@anchor(name)` line as an insertion
    /// point. Anchor names must be unique within one template.
    pub fn parse(label: &str, source: &str) -> Result<Self, ComposeError> {
        let mut spans = Vec::new();
        let mut text = String::new();
        let mut seen = Vec::new();

        for line in source.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix(ANCHOR_PREFIX) {
                let name = rest.strip_suffix(ANCHOR_SUFFIX).ok_or_else(|| {
                    ComposeError::MalformedAnchor {
                        template: label.to_owned(),
                        line: line.to_owned(),
                    }
                })?;
                if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
                {
                    return Err(ComposeError::MalformedAnchor {
                        template: label.to_owned(),
                        line: line.to_owned(),
                    });
                }
                if seen.iter().any(|existing: &String| existing.as_str() == name) {
                    return Err(ComposeError::DuplicateAnchor {
                        template: label.to_owned(),
                        anchor: name.to_owned(),
                    });
                }
                seen.push(name.to_owned());
                if !text.is_empty() {
                    spans.push(Span::Text(std::mem::take(&mut text)));
                }
                spans.push(Span::Anchor(name.to_owned()));
            } else {
                text.push_str(line);
                text.push('\n');
            }
        }
        if !text.is_empty() {
            spans.push(Span::Text(text));
        }

        Ok(Self {
            label: label.to_owned(),
            spans,
        })
    }

    /// Names of the declared anchors, in template order.
    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().filter_map(|span| match span {
            Span::Anchor(name) => Some(name.as_str()),
            Span::Text(_) => None,
        })
    }

    /// Produces the final source with every registered fragment spliced in.
    pub fn compose(&self, fragments: &FragmentSet) -> Result<String, ComposeError> {
        for (anchor, _) in &fragments.entries {
            if !self.anchors().any(|declared| declared == anchor.as_str()) {
                return Err(ComposeError::UnknownAnchor {
                    template: self.label.clone(),
                    anchor: anchor.clone(),
                });
            }
        }

        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(text) => out.push_str(text),
                Span::Anchor(name) => {
                    for (anchor, code) in &fragments.entries {
                        if anchor == name {
                            out.push_str(code);
                            if !code.ends_with('\n') {
                                out.push('\n');
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Code fragments keyed by anchor name, kept in registration order.
#[derive(Default)]
pub struct FragmentSet {
    entries: Vec<(String, String)>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `code` at `anchor`. Multiple fragments per anchor splice in
    /// registration order.
    pub fn insert(&mut self, anchor: &str, code: &str) -> &mut Self {
        self.entries.push((anchor.to_owned(), code.to_owned()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "void main() {\n//@anchor(setup)\n    work();\n//@anchor(finish)\n}\n";

    #[test]
    fn empty_registration_reproduces_base_text() {
        let template = ShaderTemplate::parse("demo", TEMPLATE).unwrap();
        let composed = template.compose(&FragmentSet::new()).unwrap();
        assert_eq!(composed, "void main() {\n    work();\n}\n");
    }

    #[test]
    fn fragments_land_at_their_anchor_in_order() {
        let template = ShaderTemplate::parse("demo", TEMPLATE).unwrap();
        let mut fragments = FragmentSet::new();
        fragments.insert("finish", "    tail();");
        fragments.insert("setup", "    first();");
        fragments.insert("setup", "    second();");

        let composed = template.compose(&fragments).unwrap();
        assert_eq!(
            composed,
            "void main() {\n    first();\n    second();\n    work();\n    tail();\n}\n"
        );
    }

    #[test]
    fn unknown_anchor_is_an_error() {
        let template = ShaderTemplate::parse("demo", TEMPLATE).unwrap();
        let mut fragments = FragmentSet::new();
        fragments.insert("missing", "    nope();");
        assert_eq!(
            template.compose(&fragments),
            Err(ComposeError::UnknownAnchor {
                template: "demo".to_owned(),
                anchor: "missing".to_owned(),
            })
        );
    }

    #[test]
    fn duplicate_anchor_is_rejected_at_parse() {
        let source = "//@anchor(a)\nbody\n//@anchor(a)\n";
        assert!(matches!(
            ShaderTemplate::parse("demo", source),
            Err(ComposeError::DuplicateAnchor { .. })
        ));
    }

    #[test]
    fn malformed_marker_is_rejected() {
        assert!(matches!(
            ShaderTemplate::parse("demo", "//@anchor(bad name)\n"),
            Err(ComposeError::MalformedAnchor { .. })
        ));
        assert!(matches!(
            ShaderTemplate::parse("demo", "//@anchor(unclosed\n"),
            Err(ComposeError::MalformedAnchor { .. })
        ));
    }

    #[test]
    fn anchors_iterate_in_template_order() {
        let template = ShaderTemplate::parse("demo", TEMPLATE).unwrap();
        let anchors: Vec<_> = template.anchors().collect();
        assert_eq!(anchors, vec!["setup", "finish"]);
    }
}

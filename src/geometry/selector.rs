//! Minimal CSS-style selector for picking SVG elements.
//!
//! Grammar: comma-separated alternatives; each alternative is a
//! whitespace-separated descendant chain of compounds; a compound is an
//! optional tag name (or `*`) followed by `.class` and `#id` parts.

use roxmltree::Node;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Compound>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    id: Option<String>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Selector {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for alt in source.split(',') {
            let chain = alt
                .split_whitespace()
                .map(|part| parse_compound(part).map_err(|reason| invalid(&reason)))
                .collect::<Result<Vec<_>>>()?;
            if chain.is_empty() {
                return Err(invalid("empty alternative"));
            }
            alternatives.push(chain);
        }

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, node: Node) -> bool {
        node.is_element() && self.alternatives.iter().any(|chain| chain_matches(chain, node))
    }
}

fn chain_matches(chain: &[Compound], node: Node) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(node) {
        return false;
    }

    // Descendant combinators only, so matching ancestors greedily is exact.
    let mut pending = ancestors.iter().rev().peekable();
    let mut current = node.parent_element();
    while let Some(compound) = pending.peek() {
        match current {
            Some(anc) => {
                if compound.matches(anc) {
                    pending.next();
                }
                current = anc.parent_element();
            }
            None => return false,
        }
    }
    true
}

impl Compound {
    fn matches(&self, node: Node) -> bool {
        if let Some(ref tag) = self.tag {
            if node.tag_name().name() != tag {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if node.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = node.attribute("class").unwrap_or("");
            let tokens: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| tokens.contains(&c.as_str())) {
                return false;
            }
        }
        true
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(part: &str) -> std::result::Result<Compound, String> {
    let mut compound = Compound::default();
    let mut chars = part.char_indices().peekable();

    // Leading tag name or universal selector
    if part.starts_with('*') {
        chars.next();
    } else {
        let end = part
            .char_indices()
            .find(|&(_, c)| !is_name_char(c))
            .map_or(part.len(), |(i, _)| i);
        if end > 0 {
            compound.tag = Some(part[..end].to_string());
            while chars.peek().is_some_and(|&(i, _)| i < end) {
                chars.next();
            }
        }
    }

    while let Some((i, marker)) = chars.next() {
        if marker != '.' && marker != '#' {
            return Err(format!("unexpected character '{marker}'"));
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, c)) = chars.peek() {
            if !is_name_char(c) {
                break;
            }
            end = j + c.len_utf8();
            chars.next();
        }
        if end == start {
            return Err(format!("missing name after '{marker}'"));
        }
        let name = part[start..end].to_string();
        if marker == '.' {
            compound.classes.push(name);
        } else if compound.id.replace(name).is_some() {
            return Err("more than one #id in a compound".to_string());
        }
    }

    Ok(compound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
        <g class="vf-stavenote">
            <g class="vf-notehead extra" id="n1"><path d="M0 0 L1 1"/></g>
            <path class="vf-stem"/>
        </g>
        <g class="vf-notehead"/>
        <text>x</text>
    </svg>"#;

    fn count(selector: &str) -> usize {
        let doc = Document::parse(SVG).unwrap();
        let sel = Selector::parse(selector).unwrap();
        doc.descendants().filter(|n| sel.matches(*n)).count()
    }

    #[test]
    fn matches_class_tag_and_id() {
        assert_eq!(count(".vf-notehead"), 2);
        assert_eq!(count("g.vf-notehead.extra"), 1);
        assert_eq!(count("#n1"), 1);
        assert_eq!(count("text"), 1);
        assert_eq!(count("path"), 2);
    }

    #[test]
    fn matches_descendant_chains_and_alternatives() {
        assert_eq!(count(".vf-stavenote .vf-notehead"), 1);
        assert_eq!(count(".vf-stavenote path"), 2);
        assert_eq!(count(".vf-stem, text"), 2);
        assert_eq!(count("svg * path"), 2);
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse(".a,,.b").is_err());
        assert!(Selector::parse("g>path").is_err());
        assert!(Selector::parse("g.").is_err());
        assert!(Selector::parse("#a#b").is_err());
    }
}

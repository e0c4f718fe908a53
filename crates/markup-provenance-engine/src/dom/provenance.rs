use serde::Serialize;

use crate::expansion::{ExpansionInfo, TemplateInfo};
use crate::source::{DomSourceRange, SourceRange};

/// Tree-construction facts recorded by earlier passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Flags {
    /// Start tag was synthesized; it has no source text.
    pub auto_inserted_start: bool,
    /// End tag was synthesized; it has no source text.
    pub auto_inserted_end: bool,
    /// Relocated out of a table by foster parenting.
    pub fostered: bool,
    /// Written as a self-closing tag.
    pub self_close: bool,
    /// Created while foster parenting; may lack invocation info.
    pub from_foster: bool,
}

/// Which source syntax produced an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    /// Written directly as literal markup.
    Html,
    Piped,
    Url,
    #[serde(rename = "magiclink")]
    MagicLink,
    Row,
}

impl Syntax {
    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Html => "html",
            Syntax::Piped => "piped",
            Syntax::Url => "url",
            Syntax::MagicLink => "magiclink",
            Syntax::Row => "row",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "html" => Syntax::Html,
            "piped" => Syntax::Piped,
            "url" => Syntax::Url,
            "magiclink" => Syntax::MagicLink,
            "row" => Syntax::Row,
            _ => return None,
        })
    }
}

/// Out-of-band data attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    /// Resolved document source range.
    pub dsr: Option<DomSourceRange>,
    /// Source range of the start tag.
    pub tsr: Option<SourceRange>,
    /// Source range of the end tag.
    pub end_tsr: Option<SourceRange>,
    pub flags: Flags,
    pub stx: Option<Syntax>,
    /// Exact source text for placeholders and entities.
    pub src: Option<String>,
    /// Original tag name of a stripped-tag placeholder.
    pub name: Option<String>,
    pub start_tag_src: Option<String>,
    pub end_tag_src: Option<String>,
    /// Link target of a piped wikilink.
    pub href: Option<String>,
    /// Explicit opening and closing widths of extension tags.
    pub ext_tag_widths: Option<(i64, i64)>,
    pub ext_link_content_start: Option<i64>,
    pub first_wikitext_node: Option<String>,
    pub unwrapped_wt: Option<String>,
    /// Invocation carried by an expansion start marker.
    pub template: Option<TemplateInfo>,
    /// Replayable metadata of an encapsulated region.
    pub expansion: Option<ExpansionInfo>,
}

impl Provenance {
    /// Node was written directly as literal markup.
    pub fn is_literal_markup(&self) -> bool {
        self.stx == Some(Syntax::Html)
    }

    pub fn dsr_start(&self) -> Option<i64> {
        self.dsr.and_then(|d| d.start)
    }

    pub fn dsr_end(&self) -> Option<i64> {
        self.dsr.and_then(|d| d.end)
    }
}

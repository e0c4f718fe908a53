//! Replayable description of an encapsulated region: literal source text
//! interleaved with the invocations that generated the rest.

use std::fmt;

use serde::Serialize;
use xi_rope::Rope;

use crate::source::{DomSourceRange, SourceRange, safe_substr};

/// One argument of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParam {
    pub key: String,
    pub value: String,
}

/// Source-level detail about one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamInfo {
    pub key: String,
    pub named: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_offsets: Option<SourceRange>,
}

/// Invocation info carried by an expansion start marker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TemplateInfo {
    /// Target as written in the source.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Set for parser-function invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
    pub params: Vec<TemplateParam>,
    #[serde(skip)]
    pub param_infos: Vec<ParamInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationKind {
    Template,
    TemplateArg,
    ParserFunction,
}

impl InvocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationKind::Template => "template",
            InvocationKind::TemplateArg => "templatearg",
            InvocationKind::ParserFunction => "parserfunction",
        }
    }
}

/// An invocation placed within an encapsulated region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub kind: InvocationKind,
    /// Position among the region's invocations.
    pub index: usize,
    /// Source span of the invocation itself.
    pub span: DomSourceRange,
    #[serde(flatten)]
    pub info: TemplateInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExpansionPart {
    Literal(String),
    Invocation(Invocation),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExpansionInfo {
    pub parts: Vec<ExpansionPart>,
    /// Argument details per invocation, in invocation order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub param_infos: Vec<Vec<ParamInfo>>,
}

impl ExpansionInfo {
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.parts.iter().filter_map(|p| match p {
            ExpansionPart::Invocation(inv) => Some(inv),
            ExpansionPart::Literal(_) => None,
        })
    }

    /// Rebuilds the source text: literals verbatim, each invocation
    /// replaced by the source slice at its span.
    pub fn reassemble(&self, source: &Rope) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ExpansionPart::Literal(text) => out.push_str(text),
                ExpansionPart::Invocation(inv) => {
                    if let (Some(start), Some(end)) = (inv.span.start, inv.span.end) {
                        out.push_str(&safe_substr(source, start, end - start));
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for ExpansionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionPart::Literal(text) => write!(f, "{text:?}"),
            ExpansionPart::Invocation(inv) => {
                write!(f, "{}:{}", inv.kind.as_str(), inv.info.target)?;
                for p in &inv.info.params {
                    write!(f, "|{}={}", p.key, p.value)?;
                }
                if let (Some(s), Some(e)) = (inv.span.start, inv.span.end) {
                    write!(f, "@{s}..{e}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ExpansionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

//! Mapping between `data-*` attributes and provenance fields.
//!
//! | attribute                     | field                          | form                     |
//! |-------------------------------|--------------------------------|--------------------------|
//! | `data-tsr`                    | `tsr`                          | `s,e`                    |
//! | `data-end-tsr`                | `end_tsr`                      | `s,e`                    |
//! | `data-dsr`                    | `dsr`                          | `s,e,o,c` (`null` = unknown) |
//! | `data-flags`                  | `flags`                        | space-separated names    |
//! | `data-stx`                    | `stx`                          | `html`, `piped`, ...     |
//! | `data-ext-tag-widths`         | `ext_tag_widths`               | `o,c`                    |
//! | `data-ext-link-content-start` | `ext_link_content_start`       | integer                  |
//! | `data-tpl`                    | `template.target` and `params` | `target\|k=v\|v`         |
//! | `data-tpl-func`               | `template.func`                |                          |
//! | `data-tpl-href`               | `template.href`                |                          |
//! | `data-param-info`             | `template.param_infos`         | `key[:named][@s-e] ...`  |
//!
//! plus the plain string fields `data-src`, `data-name`,
//! `data-start-tag-src`, `data-end-tag-src`, `data-href`,
//! `data-unwrapped-wt` and `data-first-wt`. Other attributes, `data-etag`
//! included, stay on the element.

use markup_provenance_engine::{
    Document, DomSourceRange, Flags, NodeId, ParamInfo, Provenance, SourceRange, Syntax,
    TemplateInfo, TemplateParam,
};

use crate::error::SyntaxError;

const FLAG_NAMES: [&str; 5] = [
    "auto-inserted-start",
    "auto-inserted-end",
    "fostered",
    "self-close",
    "from-foster",
];

fn bad(name: &str, value: &str, reason: impl Into<String>) -> SyntaxError {
    SyntaxError::BadAttribute {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn ints(name: &str, value: &str, count: usize) -> Result<Vec<Option<i64>>, SyntaxError> {
    let values = value
        .split(',')
        .map(str::trim)
        .map(|v| match v {
            "" | "null" => Ok(None),
            v => v
                .parse::<i64>()
                .map(Some)
                .map_err(|e| bad(name, value, e.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != count && !(count == 4 && values.len() == 6) {
        return Err(bad(name, value, format!("expected {count} numbers")));
    }
    Ok(values)
}

fn pair(name: &str, value: &str) -> Result<(i64, i64), SyntaxError> {
    match ints(name, value, 2)?.as_slice() {
        [Some(a), Some(b)] => Ok((*a, *b)),
        _ => Err(bad(name, value, "both numbers are required")),
    }
}

fn flags(value: &str) -> Result<Flags, SyntaxError> {
    let mut flags = Flags::default();
    for token in value.split_ascii_whitespace() {
        match token {
            "auto-inserted-start" => flags.auto_inserted_start = true,
            "auto-inserted-end" => flags.auto_inserted_end = true,
            "fostered" => flags.fostered = true,
            "self-close" => flags.self_close = true,
            "from-foster" => flags.from_foster = true,
            other => {
                return Err(bad(
                    "data-flags",
                    value,
                    format!("unknown flag {other:?}, expected one of {FLAG_NAMES:?}"),
                ));
            }
        }
    }
    Ok(flags)
}

fn template_params(value: &str) -> (String, Vec<TemplateParam>) {
    let mut segments = value.split('|');
    let target = segments.next().unwrap_or_default().to_string();
    let mut positional = 0;
    let params = segments
        .map(|seg| match seg.split_once('=') {
            Some((key, value)) => TemplateParam {
                key: key.trim().to_string(),
                value: value.to_string(),
            },
            None => {
                positional += 1;
                TemplateParam {
                    key: positional.to_string(),
                    value: seg.to_string(),
                }
            }
        })
        .collect();
    (target, params)
}

fn param_infos(value: &str) -> Result<Vec<ParamInfo>, SyntaxError> {
    value
        .split_ascii_whitespace()
        .map(|entry| -> Result<ParamInfo, SyntaxError> {
            let (head, offsets) = match entry.split_once('@') {
                Some((head, range)) => {
                    let (s, e) = range
                        .split_once('-')
                        .ok_or_else(|| bad("data-param-info", value, "offsets must be s-e"))?;
                    let parse = |n: &str| {
                        n.parse::<i64>()
                            .map_err(|err| bad("data-param-info", value, err.to_string()))
                    };
                    (head, Some(SourceRange::new(parse(s)?, parse(e)?)))
                }
                None => (entry, None),
            };
            let (key, named) = match head.strip_suffix(":named") {
                Some(key) => (key, true),
                None => (head, false),
            };
            Ok(ParamInfo {
                key: key.to_string(),
                named,
                src_offsets: offsets,
            })
        })
        .collect()
}

fn template(prov: &mut Provenance) -> &mut TemplateInfo {
    prov.template.get_or_insert_with(TemplateInfo::default)
}

/// Applies one provenance attribute. Returns `false` when `name` is not a
/// provenance attribute and belongs on the element.
pub fn apply(doc: &mut Document, id: NodeId, name: &str, value: &str) -> Result<bool, SyntaxError> {
    let prov = doc.provenance_mut(id);
    match name {
        "data-tsr" => {
            let (s, e) = pair(name, value)?;
            prov.tsr = Some(SourceRange::new(s, e));
        }
        "data-end-tsr" => {
            let (s, e) = pair(name, value)?;
            prov.end_tsr = Some(SourceRange::new(s, e));
        }
        "data-dsr" => prov.dsr = Some(DomSourceRange::from_json_array(&ints(name, value, 4)?)),
        "data-flags" => prov.flags = flags(value)?,
        "data-stx" => {
            prov.stx = Some(Syntax::parse(value).ok_or_else(|| bad(name, value, "unknown syntax"))?)
        }
        "data-ext-tag-widths" => prov.ext_tag_widths = Some(pair(name, value)?),
        "data-ext-link-content-start" => {
            prov.ext_link_content_start =
                Some(value.parse().map_err(|e: std::num::ParseIntError| {
                    bad(name, value, e.to_string())
                })?)
        }
        "data-src" => prov.src = Some(value.to_string()),
        "data-name" => prov.name = Some(value.to_string()),
        "data-start-tag-src" => prov.start_tag_src = Some(value.to_string()),
        "data-end-tag-src" => prov.end_tag_src = Some(value.to_string()),
        "data-href" => prov.href = Some(value.to_string()),
        "data-unwrapped-wt" => prov.unwrapped_wt = Some(value.to_string()),
        "data-first-wt" => prov.first_wikitext_node = Some(value.to_string()),
        "data-tpl" => {
            let (target, params) = template_params(value);
            let info = template(prov);
            info.target = target;
            info.params = params;
        }
        "data-tpl-func" => template(prov).func = Some(value.to_string()),
        "data-tpl-href" => template(prov).href = Some(value.to_string()),
        "data-param-info" => template(prov).param_infos = param_infos(value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// The pass output of a node as attributes: its span, first-node hint and
/// expansion parts.
pub fn annotations(doc: &Document, id: NodeId) -> Vec<(&'static str, String)> {
    let prov = doc.provenance(id);
    let mut out = Vec::new();
    if let Some(dsr) = prov.dsr {
        let values: Vec<String> = dsr
            .to_json_array()
            .into_iter()
            .map(|v| v.map_or_else(|| "null".to_string(), |n| n.to_string()))
            .collect();
        out.push(("data-dsr", values.join(",")));
    }
    if let Some(first) = &prov.first_wikitext_node {
        out.push(("data-first-wt", first.clone()));
    }
    if let Some(expansion) = &prov.expansion {
        out.push(("data-parts", expansion.to_string()));
    }
    out
}

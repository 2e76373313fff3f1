//! Default tree serialization: wire-line assembly, parameter ordering, and
//! behavior-dictated child ordering.

use crate::core::{Component, ContentLine, Node};
use crate::error::{NativeError, Result};

use super::escape::dquote_escape;
use super::fold::fold_line_into;

/// Serializes a component (BEGIN, ordered children, END) into `buf`.
///
/// Children are emitted in `sort_first` order followed by the remaining
/// keys sorted, with non-component children ahead of component children at
/// each priority tier.
///
/// ## Errors
/// Propagates native-to-text conversion failures.
pub fn serialize_component(comp: &Component, buf: &mut String, line_length: usize) -> Result<()> {
    let group = comp
        .group
        .as_ref()
        .map(|g| format!("{g}."))
        .unwrap_or_default();
    if comp.use_begin {
        fold_line_into(buf, &format!("{group}BEGIN:{}", comp.name), line_length);
    }
    for node in ordered_children(comp) {
        match node {
            Node::Line(line) => serialize_line(line, buf, line_length)?,
            Node::Component(child) => serialize_component(child, buf, line_length)?,
        }
    }
    if comp.use_begin {
        fold_line_into(buf, &format!("{group}END:{}", comp.name), line_length);
    }
    Ok(())
}

/// Serializes one content line into `buf`, folding at `line_length`.
///
/// Native values are rendered to wire form without mutating the line, so
/// the native state survives serialization.
///
/// ## Errors
/// Fails on native values with no behavior bound, and on parameter values
/// containing double quotes.
pub fn serialize_line(line: &ContentLine, buf: &mut String, line_length: usize) -> Result<()> {
    let (params, value) = match line.behavior {
        Some(b) => b.wire(line)?,
        None => {
            let text = line.value.as_text().ok_or_else(|| {
                NativeError {
                    message: format!("cannot serialize native {} value without a behavior", line.name),
                    line_number: line.line_number,
                    source: None,
                }
            })?;
            (line.params.clone(), text.to_string())
        }
    };

    let mut out = String::new();
    if let Some(group) = &line.group {
        out.push_str(group);
        out.push('.');
    }
    out.push_str(&line.name);

    let mut sorted = params;
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for param in &sorted {
        out.push(';');
        out.push_str(&param.name);
        out.push('=');
        let mut first = true;
        for value in &param.values {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&dquote_escape(value)?);
        }
    }
    out.push(':');
    out.push_str(&value);

    let limit = if line.behavior.is_some_and(|b| b.unfolded) {
        usize::MAX
    } else {
        line_length
    };
    fold_line_into(buf, &out, limit);
    Ok(())
}

/// Children in serialization order: `sort_first` keys first, then the
/// remaining keys sorted; within each tier, line children precede
/// component children.
fn ordered_children(comp: &Component) -> Vec<&Node> {
    let sort_first: &[&str] = comp.behavior.map_or(&[], |b| b.sort_first);

    let mut first_lines: Vec<&str> = Vec::new();
    let mut first_comps: Vec<&str> = Vec::new();
    for key in sort_first {
        if let Some(bucket) = comp.contents().get(*key) {
            if bucket.first().is_some_and(Node::is_component) {
                first_comps.push(key);
            } else {
                first_lines.push(key);
            }
        }
    }

    let mut rest_lines: Vec<&str> = Vec::new();
    let mut rest_comps: Vec<&str> = Vec::new();
    for (key, bucket) in comp.contents() {
        if sort_first.contains(&key.as_str()) {
            continue;
        }
        if bucket.first().is_some_and(Node::is_component) {
            rest_comps.push(key);
        } else {
            rest_lines.push(key);
        }
    }

    first_lines
        .into_iter()
        .chain(first_comps)
        .chain(rest_lines)
        .chain(rest_comps)
        .flat_map(|key| comp.children(key).iter())
        .collect()
}

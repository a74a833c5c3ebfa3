//! # Projection Rendering
//!
//! Turns a [`Projection`] into Graphviz DOT text or JSON. Layout is left to
//! Graphviz.

use crate::config::OutputFormat;
use famtree_core::{
    FamtreeError, GroupKind, Projection, ProjectionEdge, ProjectionGroup, UnionStrength,
};
use std::fmt::Write;

/// Render `projection` in `format`.
pub fn render(projection: &Projection, format: OutputFormat) -> Result<String, FamtreeError> {
    match format {
        OutputFormat::Dot => Ok(to_dot(projection)),
        OutputFormat::Json => serde_json::to_string_pretty(projection)
            .map_err(|e| FamtreeError::SerializationError(e.to_string())),
    }
}

/// Strict digraph: one node per individual, couples and parent pairs in
/// quoted per-family subgraphs, spouse edges drawn with dots at both ends.
#[must_use]
pub fn to_dot(projection: &Projection) -> String {
    let mut out = String::from("strict digraph famtree {\n");

    for node in projection.nodes() {
        let label = node
            .label
            .iter()
            .map(|line| escape(line))
            .collect::<Vec<_>>()
            .join("\\n");
        let _ = writeln!(
            out,
            "  \"{}\" [shape={}, label=\"{label}\"];",
            escape(node.id.as_str()),
            node.shape.as_str()
        );
    }

    for group in projection.groups() {
        write_group(&mut out, group);
    }

    for edge in projection.edges() {
        match edge {
            ProjectionEdge::Union {
                husband,
                wife,
                strength,
                both_ends,
                ..
            } => {
                let penwidth = match strength {
                    UnionStrength::Primary => 3,
                    UnionStrength::Secondary => 2,
                };
                let ends = if *both_ends {
                    ", dir=both, arrowhead=dot, arrowtail=dot"
                } else {
                    ""
                };
                let _ = writeln!(
                    out,
                    "  \"{}\" -> \"{}\" [penwidth={penwidth}{ends}];",
                    escape(husband.as_str()),
                    escape(wife.as_str())
                );
            }
            ProjectionEdge::Descent { parent, child, .. } => {
                let _ = writeln!(
                    out,
                    "  \"{}\" -> \"{}\";",
                    escape(parent.as_str()),
                    escape(child.as_str())
                );
            }
        }
    }

    out.push_str("}\n");
    out
}

fn write_group(out: &mut String, group: &ProjectionGroup) {
    let kind = match group.kind {
        GroupKind::Couple => "couple",
        GroupKind::ParentPair => "parents",
    };
    let members = group
        .members
        .iter()
        .map(|m| format!("\"{}\";", escape(m.as_str())))
        .collect::<Vec<_>>()
        .join(" ");
    let name = escape(&format!("{kind}_{}", group.family));
    let _ = writeln!(out, "  subgraph \"{name}\" {{ {members} }}");
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// =============================================================================
// TESTS
// =============================================================================

//! `resolveTable(table)`: fills a template table from a list of headers and
//! rows of records.
//!
//! The template needs at least two rows. The first row gets one cell per
//! header, the second is the model for every record. Both are rebuilt from
//! their first cell, so that cell's properties and run formatting carry over
//! to every generated cell.

use crate::error::{Result, StampError};
use crate::wml::comments::strip_all_anchors;
use crate::wml::node::{is_paragraph, NodeKind};
use crate::wml::run::{paragraph_runs, set_run_text, text_run};
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{display_text, text_paragraph, Invocation};

/// The value `resolveTable` expects, e.g.
/// `{"headers": ["Name", "Age"], "records": [["Ada", 36]]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StampTable {
    #[serde(default)]
    pub headers: Vec<Value>,
    #[serde(default)]
    pub records: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct TableResolverProcessor {
    /// `None` stands for a null table, replaced by the empty substitute.
    pending: Vec<(NodeId, Option<StampTable>)>,
}

impl TableResolverProcessor {
    pub fn collect(
        &mut self,
        doc: &XmlDocument,
        invocation: &Invocation<'_>,
        value: Value,
    ) -> Result<()> {
        let table = table_of(doc, invocation.paragraph)
            .ok_or_else(|| invocation.invalid("not inside a table cell"))?;
        let content = match value {
            Value::Null => None,
            other => Some(
                serde_json::from_value::<StampTable>(other)
                    .map_err(|e| invocation.invalid(format!("expects headers and records: {e}")))?,
            ),
        };
        if content.is_some() && rows_of(doc, table).len() < 2 {
            return Err(invocation.invalid("needs a header row and a data row"));
        }

        self.pending.retain(|(t, _)| *t != table);
        self.pending.push((table, content));
        Ok(())
    }

    pub fn commit(&mut self, doc: &mut XmlDocument, substitute: Option<&str>) -> Result<()> {
        for (table, content) in std::mem::take(&mut self.pending) {
            if !doc.is_attached(table) {
                continue;
            }
            match content {
                Some(content) => fill_table(doc, table, &content)?,
                None => {
                    if let Some(text) = substitute {
                        let paragraph = text_paragraph(doc, text);
                        doc.insert_before(table, paragraph);
                    }
                    doc.remove(table);
                    debug!("null table removed");
                }
            }
        }
        Ok(())
    }

    pub fn reserved(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pending.iter().map(|(table, _)| *table)
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// The table whose cell holds `paragraph` directly.
fn table_of(doc: &XmlDocument, paragraph: NodeId) -> Option<NodeId> {
    let of_kind = |node: Option<NodeId>, kind: NodeKind| node.filter(|&n| NodeKind::of(doc, n) == kind);
    let cell = of_kind(doc.parent(paragraph), NodeKind::Cell)?;
    let row = of_kind(doc.parent(cell), NodeKind::Row)?;
    of_kind(doc.parent(row), NodeKind::Table)
}

fn rows_of(doc: &XmlDocument, table: NodeId) -> Vec<NodeId> {
    doc.child_elements(table)
        .filter(|&r| NodeKind::of(doc, r) == NodeKind::Row)
        .collect()
}

fn texts(values: &[Value]) -> Vec<String> {
    values.iter().map(display_text).collect()
}

fn fill_table(doc: &mut XmlDocument, table: NodeId, content: &StampTable) -> Result<()> {
    let rows = rows_of(doc, table);
    let (Some(&header), Some(&data)) = (rows.first(), rows.get(1)) else {
        return Err(StampError::StructuralConsistency(
            "resolved table lost its template rows".to_string(),
        ));
    };
    fill_row(doc, header, &texts(&content.headers))?;

    let Some((first, rest)) = content.records.split_first() else {
        doc.remove(data);
        return Ok(());
    };
    let template = doc.deep_copy(data)?;
    strip_all_anchors(doc, template);
    fill_row(doc, data, &texts(first))?;

    let mut previous = data;
    for record in rest {
        let row = doc.deep_copy(template)?;
        doc.insert_after(previous, row);
        fill_row(doc, row, &texts(record))?;
        previous = row;
    }
    doc.remove(template);
    debug!(
        headers = content.headers.len(),
        records = content.records.len(),
        "resolved table"
    );
    Ok(())
}

/// Rebuilds `row` with one cell per value, each a copy of the first cell.
/// An empty list leaves the first cell blank.
fn fill_row(doc: &mut XmlDocument, row: NodeId, values: &[String]) -> Result<()> {
    let cells: Vec<NodeId> = doc
        .child_elements(row)
        .filter(|&c| NodeKind::of(doc, c) == NodeKind::Cell)
        .collect();
    let Some((&first, others)) = cells.split_first() else {
        return Err(StampError::StructuralConsistency(
            "table row without cells".to_string(),
        ));
    };

    let template = doc.deep_copy(first)?;
    strip_all_anchors(doc, template);
    for &cell in others {
        doc.remove(cell);
    }

    set_cell_text(doc, first, values.first().map_or("", String::as_str));
    let mut previous = first;
    for value in values.iter().skip(1) {
        let cell = doc.deep_copy(template)?;
        doc.insert_after(previous, cell);
        set_cell_text(doc, cell, value);
        previous = cell;
    }
    doc.remove(template);
    Ok(())
}

/// Leaves the cell with its first paragraph holding `text` in its first run.
fn set_cell_text(doc: &mut XmlDocument, cell: NodeId, text: &str) {
    let paragraphs: Vec<NodeId> = doc
        .child_elements(cell)
        .filter(|&p| is_paragraph(doc, p))
        .collect();
    let Some((&first, extra)) = paragraphs.split_first() else {
        let paragraph = text_paragraph(doc, text);
        doc.append(cell, paragraph);
        return;
    };
    for &paragraph in extra {
        doc.remove(paragraph);
    }

    let runs = paragraph_runs(doc, first);
    match runs.split_first() {
        Some((&run, rest)) => {
            set_run_text(doc, run, text);
            for &other in rest {
                doc.remove(other);
            }
        }
        None => {
            let run = text_run(doc, text);
            doc.append(first, run);
        }
    }
}

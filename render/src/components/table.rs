use serde::Serialize;

use super::{Component, Content, VerifyError, render_open_tag};
use crate::{Buffer, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    settings: Settings,
}

impl Table {
    pub fn new<R, C>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = C>,
        C: ToString,
    {
        Self {
            header: None,
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|cell| cell.to_string()).collect())
                .collect(),
            settings: Settings::new(),
        }
    }

    pub fn with_header<C: ToString>(mut self, header: impl IntoIterator<Item = C>) -> Self {
        self.header = Some(header.into_iter().map(|cell| cell.to_string()).collect());
        self
    }

    /// Build from serializable records; field names of the first record form
    /// the header.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self, serde_json::Error> {
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            match serde_json::to_value(record)? {
                serde_json::Value::Object(fields) => {
                    let names = header.get_or_insert_with(|| fields.keys().cloned().collect());
                    rows.push(
                        names
                            .iter()
                            .map(|name| fields.get(name).map(cell_text).unwrap_or_default())
                            .collect(),
                    );
                }
                serde_json::Value::Array(cells) => rows.push(cells.iter().map(cell_text).collect()),
                other => rows.push(vec![cell_text(&other)]),
            }
        }

        Ok(Self {
            header,
            rows,
            settings: Settings::new(),
        })
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        render_open_tag(output, "table", &self.settings, &["border"]);
        if let Some(header) = &self.header {
            output.push_str("<thead><tr>");
            for cell in header {
                output.push_str("<th>");
                output.push_html(cell);
                output.push_str("</th>");
            }
            output.push_str("</tr></thead>");
        }
        output.push_str("<tbody>");
        for row in &self.rows {
            output.push_str("<tr>");
            for cell in row {
                output.push_str("<td>");
                output.push_html(cell);
                output.push_str("</td>");
            }
            output.push_str("</tr>");
        }
        output.push_str("</tbody></table>");
    }

    pub(super) fn verify(&self, path: &str) -> Result<(), VerifyError> {
        let expected = match &self.header {
            Some(header) => header.len(),
            None => match self.rows.first() {
                Some(row) => row.len(),
                None => return Ok(()),
            },
        };

        match self.rows.iter().position(|row| row.len() != expected) {
            Some(index) => Err(VerifyError::new(
                path,
                format!(
                    "row {index} has {} cells, expected {expected}",
                    self.rows[index].len()
                ),
            )),
            None => Ok(()),
        }
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl_component!(Table);

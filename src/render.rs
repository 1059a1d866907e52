//! Rendering collaborators.
//!
//! The dashboard core only produces [`PanelUpdate`] values; anything that
//! can consume them is a renderer. The bundled `TextRenderer` writes
//! aligned tables to a writer and exists mostly for the CLI and tests; a
//! web front-end would implement the same trait.

use std::io::Write;

use crate::status::poller::{PanelState, PanelUpdate};
use crate::status::view::{PanelView, TableView};

pub trait Renderer {
    fn apply(&mut self, update: &PanelUpdate);
}

pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_panel(&mut self, view: &PanelView) -> std::io::Result<()> {
        writeln!(self.out, "== {} ==", view.resource)?;
        for badge in &view.badges {
            match &badge.text {
                Some(text) => writeln!(
                    self.out,
                    "  [{}] {}: {}",
                    badge.badge.as_str(),
                    badge.label,
                    text
                )?,
                None => writeln!(self.out, "  [{}] {}", badge.badge.as_str(), badge.label)?,
            }
        }
        for table in &view.tables {
            self.write_table(table)?;
        }
        Ok(())
    }

    fn write_table(&mut self, table: &TableView) -> std::io::Result<()> {
        if table.rows.is_empty() {
            return Ok(());
        }

        // Column widths over header and body.
        let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
        for row in &table.rows {
            for (i, cell) in row.cells.iter().enumerate() {
                if i >= widths.len() {
                    widths.push(cell.text.len());
                } else if cell.text.len() > widths[i] {
                    widths[i] = cell.text.len();
                }
            }
        }

        writeln!(self.out, "  -- {} --", table.title)?;
        let header: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:w$}", c, w = widths.get(i).copied().unwrap_or(c.len())))
            .collect();
        writeln!(self.out, "  {}", header.join("  "))?;

        for row in &table.rows {
            let mut line = String::new();
            for (i, cell) in row.cells.iter().enumerate() {
                let w = widths.get(i).copied().unwrap_or(cell.text.len());
                let text = match cell.flag {
                    Some(badge) => format!("{}!{}", cell.text, badge.as_str()),
                    None => cell.text.clone(),
                };
                line.push_str(&format!("{text:w$}  "));
            }
            if !row.actions.is_empty() {
                line.push_str(&format!("actions: {}", row.actions.join(", ")));
            }
            writeln!(self.out, "  {}", line.trim_end())?;
        }
        Ok(())
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn apply(&mut self, update: &PanelUpdate) {
        let result = match (&update.state, &update.view) {
            (PanelState::Ready, Some(view)) => self.write_panel(view),
            (PanelState::Error { message }, _) => {
                writeln!(self.out, "== {} == ERROR: {}", update.resource, message)
            }
            // Loading transitions are not worth a line on a terminal.
            _ => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "renderer write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::severity::Badge;
    use crate::status::view::{BadgeView, Cell, Row};
    use crate::status::StatusResource;

    #[test]
    fn renders_badges_tables_and_actions() {
        let view = PanelView {
            resource: StatusResource::Rolls,
            badges: vec![BadgeView {
                label: "rolls".to_string(),
                badge: Badge::Red,
                text: None,
            }],
            tables: vec![TableView {
                title: "roll status".to_string(),
                columns: vec!["instrument".to_string(), "status".to_string()],
                rows: vec![Row {
                    key: "EDOLLAR".to_string(),
                    cells: vec![Cell::plain("EDOLLAR"), Cell::flagged("-2", Badge::Red)],
                    actions: vec!["Passed_expiry".to_string()],
                }],
            }],
        };

        let mut buf = Vec::new();
        let mut renderer = TextRenderer::new(&mut buf);
        renderer.apply(&PanelUpdate {
            resource: StatusResource::Rolls,
            state: PanelState::Ready,
            view: Some(view),
        });

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("[red] rolls"));
        assert!(text.contains("EDOLLAR"));
        assert!(text.contains("-2!red"));
        assert!(text.contains("actions: Passed_expiry"));
    }

    #[test]
    fn error_state_is_surfaced() {
        let mut buf = Vec::new();
        let mut renderer = TextRenderer::new(&mut buf);
        renderer.apply(&PanelUpdate {
            resource: StatusResource::Capital,
            state: PanelState::Error {
                message: "HTTP 500".to_string(),
            },
            view: None,
        });
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("capital"));
        assert!(text.contains("ERROR: HTTP 500"));
    }
}

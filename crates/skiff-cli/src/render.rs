//! Plain-text table output for list commands.

/// Column-aligned table. Widths are computed from the widest cell per
/// column; columns are separated by two spaces.
pub struct TableView {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        debug_assert_eq!(cells.len(), self.headers.len());
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        render_line(&mut out, &self.headers, &widths);
        for row in &self.rows {
            render_line(&mut out, row, &widths);
        }
        out
    }
}

fn render_line(out: &mut String, cells: &[String], widths: &[usize]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        // No trailing padding on the last column.
        if i + 1 < cells.len() {
            for _ in cell.chars().count()..widths[i] {
                out.push(' ');
            }
        }
    }
    out.push('\n');
}

/// Drop sub-second precision and offset from an RFC 3339 timestamp for
/// list output. Falls back to the full string for short or odd inputs.
pub fn short_timestamp(ts: &str) -> &str {
    match ts.char_indices().nth(19) {
        Some((idx, _)) => &ts[..idx],
        None => ts,
    }
}

pub fn dash_if_empty(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let mut table = TableView::new(&["ID", "NAME"]);
        table.row(vec!["ab12".into(), "train".into()]);
        table.row(vec!["cdef9999".into(), "x".into()]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ID        NAME");
        assert_eq!(lines[1], "ab12      train");
        assert_eq!(lines[2], "cdef9999  x");
    }

    #[test]
    fn timestamp_truncates_to_seconds() {
        assert_eq!(
            short_timestamp("2026-08-27T10:15:30.123456789Z"),
            "2026-08-27T10:15:30"
        );
        assert_eq!(short_timestamp("short"), "short");
        assert_eq!(short_timestamp(""), "");
    }

    #[test]
    fn dashes_for_missing_values() {
        assert_eq!(dash_if_empty(None), "-");
        assert_eq!(dash_if_empty(Some("")), "-");
        assert_eq!(dash_if_empty(Some("alice")), "alice");
    }
}

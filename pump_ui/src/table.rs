//! Fixed-width text rendering of the registry table.
use pump_core::PumpRow;

const HEADERS: [&str; 4] = ["Name", "Status", "COM Port", "Activity"];

fn cells(row: &PumpRow) -> [&str; 4] {
    [
        row.name.as_str(),
        row.status.as_str(),
        row.port.as_str(),
        row.activity.as_str(),
    ]
}

/// Render rows under a `Name | Status | COM Port | Activity` header.
///
/// Columns are as wide as their widest cell; the last column is not padded.
pub fn render_table<'a>(rows: impl IntoIterator<Item = &'a PumpRow>) -> String {
    let rows: Vec<[&str; 4]> = rows.into_iter().map(cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let rule: Vec<&str> = rule.iter().map(String::as_str).collect();
    push_line(&mut out, &rule, &widths);
    for r in &rows {
        push_line(&mut out, r, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[&str], widths: &[usize; 4]) {
    let last = cells.len().saturating_sub(1);
    let mut line = String::new();
    for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str(" | ");
        }
        if i == last {
            line.push_str(cell);
        } else {
            line.push_str(&format!("{cell:<w$}"));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, status: &str, port: &str, activity: &str) -> PumpRow {
        PumpRow {
            name: name.into(),
            status: status.into(),
            port: port.into(),
            activity: activity.into(),
        }
    }

    #[test]
    fn empty_table_has_header_only() {
        let t = render_table(&Vec::<PumpRow>::new());
        assert_eq!(t, "Name | Status | COM Port | Activity\n---- | ------ | -------- | --------\n");
    }

    #[test]
    fn columns_align() {
        let rows = [
            row("Pump 1", "Dispensing", "COM3", "Dispensing 5.0mL"),
            row("B", "Disconnected", "", "Ready"),
        ];
        let t = render_table(&rows);
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "Pump 1 | Dispensing   | COM3     | Dispensing 5.0mL");
        assert_eq!(lines[3], "B      | Disconnected |          | Ready");
    }
}

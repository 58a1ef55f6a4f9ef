use modrelay_core::reconcile::CycleReport;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    println!("{}", pad_row(headers, &widths));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", pad_row(&cells, &widths));
    }
}

fn pad_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| format!("{c:w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// One row per item that changed or failed during the cycle.
pub fn print_report(report: &CycleReport) {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for id in &report.notified {
        rows.push(vec![id.clone(), "notified".into(), String::new()]);
    }
    for id in &report.retracted {
        rows.push(vec![id.clone(), "retracted".into(), String::new()]);
    }
    for id in &report.deferred {
        rows.push(vec![id.clone(), "deferred".into(), "rate limited".into()]);
    }
    for f in &report.delivery_failures {
        rows.push(vec![f.item_id.clone(), "delivery failed".into(), f.error.clone()]);
    }
    for f in &report.retraction_failures {
        rows.push(vec![f.item_id.clone(), "retraction failed".into(), f.error.clone()]);
    }

    if rows.is_empty() {
        println!("Nothing to do ({} item(s) already notified).", report.unchanged.len());
        return;
    }
    print_table(&["ITEM", "ACTION", "ERROR"], &rows);
    println!(
        "\n{} notified, {} retracted, {} unchanged, {} deferred",
        report.notified.len(),
        report.retracted.len(),
        report.unchanged.len(),
        report.deferred.len()
    );
}

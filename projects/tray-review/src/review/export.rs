use crate::review::ledger::HistoryLedger;
use anyhow::Result;

const HEADERS: [&str; 6] = [
    "Current Frame",
    "Total Frames",
    "Tray with Food",
    "Tray without Food",
    "Food",
    "Rating",
];

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// A rendered history report ready to be offered as a download.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvReport {
    pub file_name: String,
    pub body: String,
}

/// `Detection Report <base>.csv`, where base is the video name without its last extension.
pub fn report_file_name(video_name: &str) -> String {
    let base = match video_name.rfind('.') {
        Some(idx) => &video_name[..idx],
        None => video_name,
    };
    format!("Detection Report {}.csv", base)
}

/// Render the ledger in its current order. Returns `None` for an empty ledger.
pub fn export_csv(ledger: &HistoryLedger, video_name: &str) -> Result<Option<CsvReport>> {
    if ledger.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for entry in ledger.entries() {
        let total = if entry.total_frames > 0 {
            entry.total_frames.to_string()
        } else {
            "N/A".to_string()
        };
        writer.write_record([
            entry.current_frame.to_string(),
            total,
            entry.counts.tray_with_food.to_string(),
            entry.counts.tray_without_food.to_string(),
            entry.counts.food.to_string(),
            entry.rating.letter().to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;

    // Rows are newline-separated with no terminator after the last one
    let mut body = String::from_utf8(bytes)?;
    if body.ends_with('\n') {
        body.pop();
    }

    Ok(Some(CsvReport {
        file_name: report_file_name(video_name),
        body,
    }))
}

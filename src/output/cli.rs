use crate::model::{Report, ScanResult};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Advisories")]
    advisories: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

/// Renders scan-stage findings as a table followed by a one-line summary.
pub fn render_findings_table(result: &ScanResult) -> String {
    let mut out = String::new();

    if let Some(error) = &result.error {
        out.push_str(&format!("Scan failed: {}\n", error));
        return out;
    }

    if result.findings.is_empty() {
        out.push_str("No known vulnerabilities in the checked dependencies.\n");
        return out;
    }

    let rows: Vec<FindingRow> = result
        .findings
        .iter()
        .map(|f| FindingRow {
            package: truncate(&f.package, 40),
            version: f.version.clone(),
            advisories: f.identifiers.join("\n"),
            summary: truncate(&f.summary, 60),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    out.push_str(&table);
    out.push('\n');

    let advisories: usize = result.findings.iter().map(|f| f.identifiers.len()).sum();
    out.push_str(&format!(
        "\n{} vulnerable {} ({} {})\n",
        result.findings.len(),
        plural(result.findings.len(), "dependency", "dependencies"),
        advisories,
        plural(advisories, "advisory", "advisories"),
    ));
    out
}

/// Renders a report as plain text with its generation time.
pub fn render_report_text(report: &Report) -> String {
    format!(
        "{}\n\nGenerated at: {}\n",
        report.text.trim_end(),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

use super::PageReport;
use crate::render::{escape_html, table_title};

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

/// Standalone HTML page around the rendered listing, with the page data
/// embedded as JSON for scripts.
pub fn render_html(report: &PageReport) -> Vec<u8> {
    let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
    let json = json_for_script_tag(&json);
    let title = escape_html(&table_title(&report.table));

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>{title}</title>
  <style>
    body {{ font-family: 'Inter', sans-serif; margin: 2rem; color: #0f172a; }}
    .tablediv_title {{ font-size: 1.5rem; font-weight: 700; }}
    .crud-table {{ border-collapse: collapse; margin-top: 1rem; width: 100%; }}
    .crud-table th, .crud-table td {{ border: 1px solid #cbd5e1; padding: 0.4rem 0.6rem; text-align: left; }}
    .crud-table img {{ max-height: 48px; }}
    .pagination-controls {{ margin-top: 1rem; }}
    .notice {{ padding: 0.6rem; margin-bottom: 1rem; border-radius: 0.375rem; }}
    .notice-alert {{ background: #fee2e2; }}
    .notice-banner {{ background: #fef9c3; }}
    .error {{ color: #b91c1c; }}
  </style>
</head>
<body>
  <script type="application/json" id="page-data">{json}</script>
  <div id="tablediv">{body}</div>
</body>
</html>
"####,
        body = report.body
    );
    html.into_bytes()
}

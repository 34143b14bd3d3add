//! ROI report rendering.
//!
//! A [`Report`] is built once from an input, its result, and the recipient
//! email, then rendered either as an HTML page or as a PDF. Both renderings
//! carry the same content: the inputs as pretty JSON and one row per result
//! field, numbers fixed to two decimals.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::Serialize;
use thiserror::Error;

use crate::models::{SimulationInput, SimulationResult};

pub const REPORT_TITLE: &str = "ROI Simulator Report";
pub const PDF_FILENAME: &str = "roi-report.pdf";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("email required")]
    MissingEmail,
    #[error("pdf rendering failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("report encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Pdf,
}

impl ReportFormat {
    /// Anything other than `pdf` (case-insensitive) means HTML.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("pdf") => ReportFormat::Pdf,
            _ => ReportFormat::Html,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub email: String,
    pub inputs_json: String,
    pub rows: Vec<(&'static str, String)>,
}

impl Report {
    pub fn new(
        input: &SimulationInput,
        result: &SimulationResult,
        email: &str,
    ) -> Result<Self, ReportError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ReportError::MissingEmail);
        }

        Ok(Self {
            email: email.to_string(),
            inputs_json: serde_json::to_string_pretty(input)?,
            rows: result_rows(result)?,
        })
    }

    pub fn render_html(&self) -> String {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|(key, value)| {
                format!(
                    "<tr><td style=\"padding:6px;border:1px solid #ddd;font-family:monospace\">{}</td>\
                     <td style=\"padding:6px;border:1px solid #ddd\">{}</td></tr>",
                    escape_html(key),
                    escape_html(value)
                )
            })
            .collect();

        format!(
            r#"<html>
  <head>
    <meta charset="utf-8" />
    <title>ROI Report</title>
  </head>
  <body style="font-family:Arial,Helvetica,sans-serif;padding:24px;">
    <h1>{title}</h1>
    <p>Generated for: {email}</p>
    <h2>Inputs</h2>
    <pre>{inputs}</pre>
    <h2>Results</h2>
    <table style="border-collapse:collapse">{rows}</table>
  </body>
</html>
"#,
            title = REPORT_TITLE,
            email = escape_html(&self.email),
            inputs = escape_html(&self.inputs_json),
            rows = rows.join("\n"),
        )
    }

    /// Text lines of the printed report, in page order.
    fn lines(&self) -> Vec<PdfLine> {
        let mut lines = vec![
            PdfLine::heading(REPORT_TITLE),
            PdfLine::body(format!("Generated for: {}", self.email)),
            PdfLine::blank(),
            PdfLine::heading("Inputs"),
        ];
        lines.extend(self.inputs_json.lines().map(PdfLine::body));
        lines.push(PdfLine::blank());
        lines.push(PdfLine::heading("Results"));

        let key_width = self.rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &self.rows {
            let mut value_lines = value.lines();
            let first = value_lines.next().unwrap_or_default();
            lines.push(PdfLine::body(format!("{key:<key_width$}  {first}")));
            for rest in value_lines {
                lines.push(PdfLine::body(format!("{:key_width$}  {rest}", "")));
            }
        }
        lines
    }

    pub fn render_pdf(&self) -> Result<Vec<u8>, ReportError> {
        const PAGE_WIDTH: i64 = 595; // A4 in points
        const PAGE_HEIGHT: i64 = 842;
        const MARGIN: i64 = 56;
        const LEADING: i64 = 14;

        let lines_per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let body_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let heading_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => body_font,
                "F2" => heading_font,
            },
        });

        let lines = self.lines();
        let mut kids = Vec::new();
        for chunk in lines.chunks(lines_per_page.max(1)) {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("TL", vec![Object::Integer(LEADING)]),
                Operation::new(
                    "Td",
                    vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
                ),
            ];
            for line in chunk {
                let (font, size) = if line.heading { ("F2", 13) } else { ("F1", 9) };
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(win_ansi(&line.text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let page_count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(lopdf::Error::from)?;
        Ok(bytes)
    }
}

struct PdfLine {
    text: String,
    heading: bool,
}

impl PdfLine {
    fn heading(text: &str) -> Self {
        Self {
            text: text.to_string(),
            heading: true,
        }
    }

    fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: false,
        }
    }

    fn blank() -> Self {
        Self::body("")
    }
}

/// One row per result field, in declaration order.
fn result_rows(result: &SimulationResult) -> Result<Vec<(&'static str, String)>, ReportError> {
    Ok(vec![
        ("inputs", pretty(&result.inputs)?),
        ("constants", pretty(&result.constants)?),
        ("labor_cost_manual", fixed(result.labor_cost_manual)),
        ("auto_cost", fixed(result.auto_cost)),
        ("error_savings", fixed(result.error_savings)),
        ("monthly_savings", fixed(result.monthly_savings)),
        ("cumulative_savings", fixed(result.cumulative_savings)),
        ("net_savings", fixed(result.net_savings)),
        ("payback_months", fixed_or_null(result.payback_months)),
        ("roi_percentage", fixed_or_null(result.roi_percentage)),
        ("time_horizon_months", fixed(result.time_horizon_months)),
    ])
}

fn pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn fixed(value: f64) -> String {
    format!("{value:.2}")
}

fn fixed_or_null(value: Option<f64>) -> String {
    value.map_or_else(|| "null".to_string(), fixed)
}

/// Encodes text for the standard Type1 fonts. Characters outside
/// WinAnsiEncoding become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8a,
            '‹' => 0x8b,
            'Œ' => 0x8c,
            'Ž' => 0x8e,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9a,
            '›' => 0x9b,
            'œ' => 0x9c,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::simulate;

    fn sample() -> Report {
        let input = SimulationInput::starter();
        Report::new(&input, &simulate(&input), "cfo@example.com").unwrap()
    }

    #[test]
    fn test_requires_email() {
        let input = SimulationInput::starter();
        let err = Report::new(&input, &simulate(&input), "   ").unwrap_err();
        assert!(matches!(err, ReportError::MissingEmail));
        assert_eq!(err.to_string(), "email required");
    }

    #[test]
    fn test_html_has_every_result_field() {
        let html = sample().render_html();

        assert!(html.contains("<h1>ROI Simulator Report</h1>"));
        assert!(html.contains("Generated for: cfo@example.com"));
        for key in [
            "inputs",
            "constants",
            "labor_cost_manual",
            "auto_cost",
            "error_savings",
            "monthly_savings",
            "cumulative_savings",
            "net_savings",
            "payback_months",
            "roi_percentage",
            "time_horizon_months",
        ] {
            assert!(html.contains(&format!(">{key}</td>")), "missing row {key}");
        }
        assert!(html.contains(">33446.60</td>"));
        assert!(html.contains(">36.00</td>"));
        assert!(html.contains("&quot;monthly_invoice_volume&quot;: 2000.0"));
    }

    #[test]
    fn test_null_fields_render_as_null() {
        let input = SimulationInput::default();
        let html = Report::new(&input, &simulate(&input), "a@b.c")
            .unwrap()
            .render_html();
        assert!(html.contains(">roi_percentage</td><td style=\"padding:6px;border:1px solid #ddd\">null</td>"));
    }

    #[test]
    fn test_email_is_escaped() {
        let input = SimulationInput::starter();
        let html = Report::new(&input, &simulate(&input), "<script>@x.y")
            .unwrap()
            .render_html();
        assert!(html.contains("Generated for: &lt;script&gt;@x.y"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_pdf_bytes() {
        let pdf = sample().render_pdf().unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert!(pdf.len() > 500);

        let parsed = Document::load_mem(&pdf).unwrap();
        assert!(!parsed.get_pages().is_empty());
    }

    #[test]
    fn test_win_ansi_text() {
        assert_eq!(win_ansi("ROI 12%"), b"ROI 12%".to_vec());
        assert_eq!(win_ansi("Café — €5"), vec![b'C', b'a', b'f', 0xe9, b' ', 0x97, b' ', 0x80, b'5']);
        assert_eq!(win_ansi("Zoë “x”"), vec![b'Z', b'o', 0xeb, b' ', 0x93, b'x', 0x94]);
        assert_eq!(win_ansi("日本\t"), b"???".to_vec());
    }

    #[test]
    fn test_pdf_with_non_ascii_text() {
        let input = SimulationInput {
            scenario_name: Some("Überweisung Q3 – Zürich".to_string()),
            ..SimulationInput::starter()
        };
        let report = Report::new(&input, &simulate(&input), "josé@exämple.com").unwrap();
        let pdf = report.render_pdf().unwrap();

        let parsed = Document::load_mem(&pdf).unwrap();
        assert!(!parsed.get_pages().is_empty());
        let encodings = parsed
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| d.get(b"Type").and_then(Object::as_name).ok() == Some(&b"Font"[..]))
            .map(|d| d.get(b"Encoding").and_then(Object::as_name).ok().map(<[u8]>::to_vec))
            .collect::<Vec<_>>();
        assert_eq!(encodings.len(), 2);
        assert!(encodings.iter().all(|e| e.as_deref() == Some(&b"WinAnsiEncoding"[..])));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ReportFormat::parse(Some("pdf")), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse(Some(" PDF ")), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse(Some("html")), ReportFormat::Html);
        assert_eq!(ReportFormat::parse(None), ReportFormat::Html);
    }
}

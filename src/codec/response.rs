//! Tolerant extraction from response envelopes
//!
//! The external server's XML is not schema-validated and fields are
//! frequently absent, so extraction never fails: unknown or missing tags
//! yield empty results and malformed markup ends the scan quietly.

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Raw inner content of every element named `tag`, nested markup preserved.
///
/// Matching is case-insensitive on the local name, so attribute-bearing and
/// namespaced elements are still found.
pub fn extract_elements(xml: &str, tag: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start))
                if start
                    .local_name()
                    .as_ref()
                    .eq_ignore_ascii_case(tag.as_bytes()) =>
            {
                match reader.read_text(start.name()) {
                    Ok(text) => out.push(text.into_owned()),
                    Err(_) => break,
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    out
}

/// Unescaped text content of the first child element named `tag`, or `None`
pub fn child_text(fragment: &str, tag: &str) -> Option<String> {
    let mut reader = Reader::from_str(fragment);

    loop {
        match reader.read_event() {
            Ok(Event::Start(start))
                if start
                    .local_name()
                    .as_ref()
                    .eq_ignore_ascii_case(tag.as_bytes()) =>
            {
                let raw = reader.read_text(start.name()).ok()?;
                return Some(
                    unescape(&raw)
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| raw.into_owned())
                        .trim()
                        .to_string(),
                );
            }
            Ok(Event::Empty(start))
                if start
                    .local_name()
                    .as_ref()
                    .eq_ignore_ascii_case(tag.as_bytes()) =>
            {
                return Some(String::new());
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

/// Parsed outcome of an import (push) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub created: i64,
    pub altered: i64,
    pub errors: Vec<String>,
}

impl ImportResult {
    /// Conservative success rule: no error lines AND something actually
    /// happened. A silently-ignored request is not a success.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && (self.created > 0 || self.altered > 0)
    }
}

/// Parse an import response envelope into counts and error lines.
///
/// `LASTMSG` is treated as an error only when it mentions "error"
/// case-insensitively; the external system also uses it for benign notices.
pub fn parse_import_result(xml: &str) -> ImportResult {
    let created = child_text(xml, "CREATED")
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(0);
    let altered = child_text(xml, "ALTERED")
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(0);

    let mut errors: Vec<String> = extract_elements(xml, "LINEERROR")
        .into_iter()
        .map(|raw| {
            unescape(&raw)
                .map(|cow| cow.into_owned())
                .unwrap_or(raw)
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect();

    if let Some(last_msg) = child_text(xml, "LASTMSG") {
        if last_msg.to_lowercase().contains("error") {
            errors.push(last_msg);
        }
    }

    ImportResult {
        created,
        altered,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_repeated_elements_with_nested_markup() {
        let xml = "<ENVELOPE>\
                   <LEDGER NAME=\"Cash\"><NAME>Cash</NAME><PARENT>Current Assets</PARENT></LEDGER>\
                   <LEDGER><NAME>Bank</NAME></LEDGER>\
                   </ENVELOPE>";
        let elements = extract_elements(xml, "LEDGER");
        assert_eq!(elements.len(), 2);
        assert!(elements[0].contains("<PARENT>Current Assets</PARENT>"));
        assert!(elements[1].contains("<NAME>Bank</NAME>"));
    }

    #[test]
    fn missing_tag_yields_empty_not_error() {
        assert!(extract_elements("<ENVELOPE></ENVELOPE>", "LEDGER").is_empty());
        assert!(extract_elements("not xml at all", "LEDGER").is_empty());
        assert_eq!(child_text("<A><B>1</B></A>", "C"), None);
    }

    #[test]
    fn child_text_unescapes_entities() {
        let fragment = "<LEDGER><NAME>Smith &amp; Sons</NAME></LEDGER>";
        assert_eq!(
            child_text(fragment, "NAME"),
            Some("Smith & Sons".to_string())
        );
    }

    #[test]
    fn child_text_handles_self_closing_tags() {
        assert_eq!(
            child_text("<LEDGER><EMAIL/></LEDGER>", "EMAIL"),
            Some(String::new())
        );
    }

    #[test]
    fn import_result_success_needs_created_or_altered() {
        let ok = parse_import_result(
            "<RESPONSE><CREATED>1</CREATED><ALTERED>0</ALTERED></RESPONSE>",
        );
        assert!(ok.is_success());
        assert_eq!(ok.created, 1);

        // Zero counts and no errors means the request was silently ignored
        let ignored = parse_import_result(
            "<RESPONSE><CREATED>0</CREATED><ALTERED>0</ALTERED></RESPONSE>",
        );
        assert!(!ignored.is_success());
    }

    #[test]
    fn line_errors_fail_the_import() {
        let result = parse_import_result(
            "<RESPONSE><CREATED>1</CREATED>\
             <LINEERROR>Ledger does not exist</LINEERROR></RESPONSE>",
        );
        assert!(!result.is_success());
        assert_eq!(result.errors, vec!["Ledger does not exist".to_string()]);
    }

    #[test]
    fn lastmsg_counts_only_when_it_mentions_error() {
        let benign = parse_import_result(
            "<RESPONSE><CREATED>1</CREATED><LASTMSG>Import finished</LASTMSG></RESPONSE>",
        );
        assert!(benign.is_success());

        let failing = parse_import_result(
            "<RESPONSE><CREATED>1</CREATED><LASTMSG>ERROR: company closed</LASTMSG></RESPONSE>",
        );
        assert!(!failing.is_success());
        assert_eq!(failing.errors.len(), 1);
    }

    #[test]
    fn malformed_counts_default_to_zero() {
        let result =
            parse_import_result("<RESPONSE><CREATED>many</CREATED></RESPONSE>");
        assert_eq!(result.created, 0);
        assert!(!result.is_success());
    }
}

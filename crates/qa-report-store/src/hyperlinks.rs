//! Hyperlink targets of the first worksheet in an `.xlsx` package.
//!
//! calamine exposes cell text only, so a Links cell that displays "View"
//! needs its target read from the worksheet relationships.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use zip::ZipArchive;

use crate::LoadError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Zero-based `(row, column)` of a worksheet cell.
pub(crate) type CellPosition = (u32, u32);

static SHEET_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<sheet\b[^>]*>").ok());
static RELATIONSHIP_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"<Relationship\b[^>]*>").ok());
static HYPERLINK_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<hyperlink\b[^>]*>").ok());
static RELATIONSHIP_ID_ATTR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"\s[A-Za-z][A-Za-z0-9]*:id="([^"]*)""#).ok());
static ID_ATTR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"\sId="([^"]*)""#).ok());
static TARGET_ATTR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"\sTarget="([^"]*)""#).ok());
static REF_ATTR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"\sref="([^"]*)""#).ok());

fn tags<'a>(pattern: &Lazy<Option<Regex>>, xml: &'a str) -> Vec<&'a str> {
    pattern.as_ref().map_or_else(Vec::new, |regex| {
        regex.find_iter(xml).map(|found| found.as_str()).collect()
    })
}

fn attr(pattern: &Lazy<Option<Regex>>, tag: &str) -> Option<String> {
    let captures = pattern.as_ref()?.captures(tag)?;
    Some(unescape(captures.get(1)?.as_str()))
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Relationship id of the first `<sheet>` in workbook order.
fn first_sheet_relationship(workbook_xml: &str) -> Option<String> {
    tags(&SHEET_TAG, workbook_xml).first().and_then(|tag| attr(&RELATIONSHIP_ID_ATTR, tag))
}

/// `Id -> Target` for every relationship in a `.rels` part.
fn relationship_targets(rels_xml: &str) -> HashMap<String, String> {
    tags(&RELATIONSHIP_TAG, rels_xml)
        .into_iter()
        .filter_map(|tag| Some((attr(&ID_ATTR, tag)?, attr(&TARGET_ATTR, tag)?)))
        .collect()
}

/// Column letters and row number of an `A1` reference, zero-based.
fn parse_cell_ref(reference: &str) -> Option<CellPosition> {
    let reference = reference.replace('$', "");
    let split = reference.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    let column = letters.chars().try_fold(0_u32, |acc, ch| {
        let digit = u32::from(ch.to_ascii_uppercase()) - u32::from('A') + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    let row = digits.parse::<u32>().ok()?;
    Some((row.checked_sub(1)?, column.checked_sub(1)?))
}

/// Every cell covered by `ref`, which may be a single cell or `A1:B2`.
fn cells_in_ref(reference: &str) -> Vec<CellPosition> {
    let mut corners = reference.split(':');
    let Some(start) = corners.next().and_then(parse_cell_ref) else {
        return Vec::new();
    };
    let end = corners.next().and_then(parse_cell_ref).unwrap_or(start);
    let mut cells = Vec::new();
    for row in start.0.min(end.0)..=start.0.max(end.0) {
        for column in start.1.min(end.1)..=start.1.max(end.1) {
            cells.push((row, column));
        }
    }
    cells
}

/// External hyperlink target per cell of one worksheet part.
fn sheet_links(sheet_xml: &str, sheet_rels_xml: &str) -> HashMap<CellPosition, String> {
    let targets = relationship_targets(sheet_rels_xml);
    let mut links = HashMap::new();
    for tag in tags(&HYPERLINK_TAG, sheet_xml) {
        let (Some(reference), Some(id)) = (attr(&REF_ATTR, tag), attr(&RELATIONSHIP_ID_ATTR, tag))
        else {
            continue;
        };
        let Some(target) = targets.get(&id) else {
            continue;
        };
        for cell in cells_in_ref(&reference) {
            links.entry(cell).or_insert_with(|| target.trim().to_string());
        }
    }
    links
}

/// Part name of a workbook relationship target, which is relative to `xl/`.
fn workbook_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn rels_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, LoadError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(LoadError::Spreadsheet(err.to_string())),
    };
    let mut contents = String::new();
    part.read_to_string(&mut contents)
        .map_err(|err| LoadError::Spreadsheet(format!("{name}: {err}")))?;
    Ok(Some(contents))
}

/// Hyperlink targets of the first worksheet, keyed by absolute cell position.
///
/// A package without hyperlinks yields an empty map.
///
/// # Errors
/// Returns [`LoadError::Io`] when the file cannot be opened and
/// [`LoadError::Spreadsheet`] when it is not a readable zip package.
pub(crate) fn first_sheet_hyperlinks(
    path: &Path,
) -> Result<HashMap<CellPosition, String>, LoadError> {
    let file =
        File::open(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| LoadError::Spreadsheet(err.to_string()))?;

    let Some(workbook_xml) = read_part(&mut archive, WORKBOOK_PART)? else {
        return Ok(HashMap::new());
    };
    let Some(sheet_id) = first_sheet_relationship(&workbook_xml) else {
        return Ok(HashMap::new());
    };
    let workbook_rels = read_part(&mut archive, WORKBOOK_RELS_PART)?.unwrap_or_default();
    let Some(sheet_target) = relationship_targets(&workbook_rels).remove(&sheet_id) else {
        return Ok(HashMap::new());
    };

    let sheet_part = workbook_part(&sheet_target);
    let Some(sheet_xml) = read_part(&mut archive, &sheet_part)? else {
        return Ok(HashMap::new());
    };
    let sheet_rels = read_part(&mut archive, &rels_part(&sheet_part))?.unwrap_or_default();
    Ok(sheet_links(&sheet_xml, &sheet_rels))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    const WORKBOOK_XML: &str = concat!(
        r#"<workbook xmlns:r="http://schemas.openxmlformats.org/"#,
        r#"officeDocument/2006/relationships">"#,
        r#"<sheets><sheet name="Report" sheetId="1" r:id="rId2"/>"#,
        r#"<sheet name="Notes" sheetId="2" r:id="rId1"/></sheets></workbook>"#,
    );
    const WORKBOOK_RELS: &str = concat!(
        r#"<Relationships>"#,
        r#"<Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet2.xml"/>"#,
        r#"<Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/sheet1.xml"/>"#,
        r#"</Relationships>"#,
    );
    const SHEET_XML: &str = concat!(
        r#"<worksheet><sheetData/><hyperlinks>"#,
        r#"<hyperlink ref="H2" r:id="rId7" display="View"/>"#,
        r#"<hyperlink ref="H3:H4" r:id="rId8"/>"#,
        r#"<hyperlink ref="A1" location="Notes!A1"/>"#,
        r#"</hyperlinks></worksheet>"#,
    );
    const SHEET_RELS: &str = concat!(
        r#"<Relationships>"#,
        r#"<Relationship Id="rId7" Target="https://evidence.test/a?x=1&amp;y=2"/>"#,
        r#"<Relationship Id="rId8" Target="https://evidence.test/b" TargetMode="External"/>"#,
        r#"</Relationships>"#,
    );

    #[test]
    fn cell_references_are_zero_based() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("H12"), Some((11, 7)));
        assert_eq!(parse_cell_ref("$AA$3"), Some((2, 26)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(cells_in_ref("B2:B4"), vec![(1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn first_sheet_follows_workbook_order_not_relationship_order() {
        assert_eq!(first_sheet_relationship(WORKBOOK_XML).as_deref(), Some("rId2"));
        let targets = relationship_targets(WORKBOOK_RELS);
        let part = workbook_part(&targets["rId2"]);
        assert_eq!(part, "xl/worksheets/sheet1.xml");
        assert_eq!(rels_part(&part), "xl/worksheets/_rels/sheet1.xml.rels");
        assert_eq!(workbook_part(&targets["rId1"]), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn external_hyperlinks_resolve_per_cell() {
        let links = sheet_links(SHEET_XML, SHEET_RELS);
        assert_eq!(
            links.get(&(1, 7)).map(String::as_str),
            Some("https://evidence.test/a?x=1&y=2")
        );
        assert_eq!(links.get(&(2, 7)).map(String::as_str), Some("https://evidence.test/b"));
        assert_eq!(links.get(&(3, 7)).map(String::as_str), Some("https://evidence.test/b"));
        assert!(!links.contains_key(&(0, 0)));
    }

    #[test]
    fn package_hyperlinks_are_read_from_zip_parts() {
        let mut file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .unwrap_or_else(|err| panic!("tempfile: {err}"));
        let mut writer = ZipWriter::new(file.as_file_mut());
        let parts = [
            (WORKBOOK_PART, WORKBOOK_XML),
            (WORKBOOK_RELS_PART, WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", SHEET_XML),
            ("xl/worksheets/_rels/sheet1.xml.rels", SHEET_RELS),
        ];
        for (name, body) in parts {
            writer
                .start_file(name, SimpleFileOptions::default())
                .unwrap_or_else(|err| panic!("start {name}: {err}"));
            writer.write_all(body.as_bytes()).unwrap_or_else(|err| panic!("write {name}: {err}"));
        }
        writer.finish().unwrap_or_else(|err| panic!("finish zip: {err}"));

        let links =
            first_sheet_hyperlinks(file.path()).unwrap_or_else(|err| panic!("hyperlinks: {err}"));
        assert_eq!(links.len(), 3);
        assert_eq!(links.get(&(2, 7)).map(String::as_str), Some("https://evidence.test/b"));
    }

    #[test]
    fn non_zip_file_is_spreadsheet_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .unwrap_or_else(|err| panic!("tempfile: {err}"));
        file.write_all(b"not a zip").unwrap_or_else(|err| panic!("write: {err}"));
        assert!(matches!(first_sheet_hyperlinks(file.path()), Err(LoadError::Spreadsheet(_))));
    }
}

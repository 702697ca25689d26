use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::source::LogicalLine;
use super::vocabulary::vocabulary;
use super::{DescriptionError, Document, Item, Section, SectionKind};

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*(?P<name>[A-Za-z_]+)\s*\]$").expect("valid section header regex")
});

static ITEM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid item key regex"));

pub(super) fn parse_lines(lines: &[LogicalLine]) -> Result<Document, DescriptionError> {
    let mut document = Document::default();

    for line in lines {
        if let Some(captures) = SECTION_HEADER.captures(&line.text) {
            let name = captures["name"].to_ascii_lowercase();
            let kind = match name.as_str() {
                "global" => SectionKind::Global,
                "graph" => SectionKind::Graph,
                "bench" => SectionKind::Bench,
                "curve" => SectionKind::Curve,
                "end" => break,
                _ => {
                    return Err(DescriptionError::at(
                        &line.location,
                        format!("unknown section [{name}]"),
                    ));
                }
            };
            document.sections.push(Section {
                kind,
                location: line.location.clone(),
                items: Vec::new(),
            });
            continue;
        }

        let section = document.sections.last_mut().ok_or_else(|| {
            DescriptionError::at(&line.location, "item appears before any section header")
        })?;
        let item = parse_item(line)?;
        admit(section, &item)?;
        section.items.push(item);
    }

    debug!(sections = document.sections.len(), "parsed description");
    Ok(document)
}

fn parse_item(line: &LogicalLine) -> Result<Item, DescriptionError> {
    let (key, value) = line.text.split_once(':').ok_or_else(|| {
        DescriptionError::at(&line.location, format!("expected 'key: value', found '{}'", line.text))
    })?;
    let key = key.trim().to_ascii_lowercase();
    if !ITEM_KEY.is_match(&key) {
        return Err(DescriptionError::at(
            &line.location,
            format!("malformed key '{}'", key),
        ));
    }

    Ok(Item {
        key,
        value: value.trim().to_string(),
        location: line.location.clone(),
    })
}

/// Checks the item against its section's vocabulary: the key must be known,
/// single-valued keys may appear once and the value must pass the key's
/// syntax check.
fn admit(section: &Section, item: &Item) -> Result<(), DescriptionError> {
    let spec = vocabulary(section.kind)
        .iter()
        .find(|spec| spec.name == item.key)
        .ok_or_else(|| {
            DescriptionError::at(
                &item.location,
                format!("unknown key '{}' in [{}] section", item.key, section.kind.as_str()),
            )
        })?;

    if !spec.repeat {
        if let Some(previous) = section.item(&item.key) {
            return Err(DescriptionError::at(
                &item.location,
                format!(
                    "duplicate key '{}' in [{}] section (first set at line {})",
                    item.key,
                    section.kind.as_str(),
                    previous.location.line
                ),
            ));
        }
    }

    if let Some(check) = spec.check {
        check(&item.value).map_err(|message| {
            DescriptionError::at(&item.location, format!("{}: {message}", item.key))
        })?;
    }
    Ok(())
}

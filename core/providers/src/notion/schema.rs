//! Notion property schema for replica records.
//!
//! Converts [`ReplicaFields`] into Notion page properties and parses queried
//! pages back into [`ReplicaRecord`]s.

use serde_json::{json, Map, Value};

use taskmirror_common::{Error, ReplicaFields, ReplicaRecord, Result};

pub const PROP_NAME: &str = "Name";
pub const PROP_DESCRIPTION: &str = "Description";
pub const PROP_STATUS: &str = "Status";
pub const PROP_TASK_LIST: &str = "Task List";
pub const PROP_DUE_DATE: &str = "Due Date";
pub const PROP_COMPLETION_DATE: &str = "Completion Date";

/// Title of a newly provisioned database.
pub const DATABASE_TITLE: &str = "Tasks";

/// Notion caps a single text object at 2000 characters.
const MAX_TEXT_LEN: usize = 2000;

/// Properties for a database holding replica records.
pub fn database_properties() -> Value {
    json!({
        PROP_NAME: { "title": {} },
        PROP_DESCRIPTION: { "rich_text": {} },
        PROP_STATUS: {
            "select": {
                "options": [
                    { "name": "completed" },
                    { "name": "incomplete" }
                ]
            }
        },
        PROP_DUE_DATE: { "date": {} },
        PROP_COMPLETION_DATE: { "date": {} },
        PROP_TASK_LIST: { "rich_text": {} }
    })
}

/// Render page properties for `fields`.
///
/// With `clear_absent_dates`, missing dates are written as `null` so an
/// update overwrites any previous value; otherwise they are omitted.
pub fn page_properties(fields: &ReplicaFields, clear_absent_dates: bool) -> Value {
    let mut props = Map::new();
    props.insert(PROP_NAME.into(), json!({ "title": text_segments(&fields.title) }));
    props.insert(
        PROP_DESCRIPTION.into(),
        json!({ "rich_text": text_segments(&fields.description) }),
    );
    props.insert(
        PROP_STATUS.into(),
        json!({ "select": { "name": fields.status } }),
    );
    props.insert(
        PROP_TASK_LIST.into(),
        json!({ "rich_text": text_segments(&fields.task_list) }),
    );

    for (name, value) in [
        (PROP_DUE_DATE, &fields.due),
        (PROP_COMPLETION_DATE, &fields.completion_date),
    ] {
        match value {
            Some(start) => {
                props.insert(name.into(), json!({ "date": { "start": start } }));
            }
            None if clear_absent_dates => {
                props.insert(name.into(), json!({ "date": null }));
            }
            None => {}
        }
    }

    Value::Object(props)
}

/// Split text into text objects that respect the per-object length cap.
fn text_segments(content: &str) -> Value {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return json!([{ "type": "text", "text": { "content": "" } }]);
    }
    let segments: Vec<Value> = chars
        .chunks(MAX_TEXT_LEN)
        .map(|chunk| {
            let part: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": part } })
        })
        .collect();
    Value::Array(segments)
}

/// Parse a queried page into a replica record.
///
/// # Errors
/// - `MalformedRecord` if Name, Description, Status or Task List is missing,
///   the title is empty, or the status has no selected option
pub fn parse_page(id: &str, properties: &Map<String, Value>) -> Result<ReplicaRecord> {
    let malformed = |reason: String| Error::MalformedRecord {
        id: id.to_string(),
        reason,
    };

    let title = read_text(properties, PROP_NAME, "title").map_err(&malformed)?;
    if title.is_empty() {
        return Err(malformed(format!("empty {}", PROP_NAME)));
    }
    let description = read_text(properties, PROP_DESCRIPTION, "rich_text").map_err(&malformed)?;
    let parent_list_title =
        read_text(properties, PROP_TASK_LIST, "rich_text").map_err(&malformed)?;

    let status = properties
        .get(PROP_STATUS)
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("missing {}", PROP_STATUS)))?
        .to_string();

    Ok(ReplicaRecord {
        id: id.to_string(),
        title,
        description,
        status,
        due: read_date(properties, PROP_DUE_DATE),
        completion_date: read_date(properties, PROP_COMPLETION_DATE),
        parent_list_title,
    })
}

/// Concatenate the segments of a title or rich_text property.
fn read_text(
    properties: &Map<String, Value>,
    name: &str,
    kind: &str,
) -> std::result::Result<String, String> {
    let segments = properties
        .get(name)
        .and_then(|p| p.get(kind))
        .and_then(Value::as_array)
        .ok_or_else(|| format!("missing {}", name))?;

    Ok(segments
        .iter()
        .filter_map(|seg| {
            seg.get("plain_text")
                .or_else(|| seg.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect())
}

/// Dates are optional: a missing property or a null date both read as absent.
fn read_date(properties: &Map<String, Value>, name: &str) -> Option<String> {
    properties
        .get(name)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ReplicaFields {
        ReplicaFields {
            title: "Buy milk".into(),
            description: "2 liters".into(),
            status: "incomplete".into(),
            task_list: "Home".into(),
            due: Some("2024-01-05T00:00:00.000Z".into()),
            completion_date: None,
        }
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_properties_roundtrip() {
        let props = as_map(page_properties(&fields(), true));
        let record = parse_page("page-1", &props).unwrap();

        assert_eq!(record.id, "page-1");
        assert_eq!(record.fields(), fields());
    }

    #[test]
    fn test_absent_dates_on_create_and_update() {
        let create = page_properties(&fields(), false);
        assert!(create.get(PROP_COMPLETION_DATE).is_none());

        let update = page_properties(&fields(), true);
        assert_eq!(update[PROP_COMPLETION_DATE], json!({ "date": null }));
        assert_eq!(
            update[PROP_DUE_DATE]["date"]["start"],
            "2024-01-05T00:00:00.000Z"
        );
    }

    #[test]
    fn test_long_text_is_split() {
        let mut long = fields();
        long.description = "x".repeat(4500);

        let props = page_properties(&long, false);
        let segments = props[PROP_DESCRIPTION]["rich_text"].as_array().unwrap();
        assert_eq!(segments.len(), 3);

        let record = parse_page("p", &as_map(props)).unwrap();
        assert_eq!(record.description.len(), 4500);
    }

    #[test]
    fn test_missing_status_is_malformed() {
        let mut props = as_map(page_properties(&fields(), false));
        props.insert(PROP_STATUS.into(), json!({ "select": null }));

        let err = parse_page("p", &props).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn test_empty_title_is_malformed() {
        let mut props = as_map(page_properties(&fields(), false));
        props.insert(PROP_NAME.into(), json!({ "title": [] }));

        assert!(parse_page("p", &props).is_err());
    }

    #[test]
    fn test_missing_task_list_is_malformed() {
        let mut props = as_map(page_properties(&fields(), false));
        props.remove(PROP_TASK_LIST);

        assert!(parse_page("p", &props).is_err());
    }

    #[test]
    fn test_queried_page_shape() {
        // Shape returned by the query endpoint, with plain_text and null dates.
        let props = as_map(json!({
            "Name": { "id": "title", "type": "title", "title": [
                { "type": "text", "text": { "content": "Report" }, "plain_text": "Report" }
            ]},
            "Description": { "type": "rich_text", "rich_text": [] },
            "Status": { "type": "select", "select": { "id": "x", "name": "completed" } },
            "Task List": { "type": "rich_text", "rich_text": [
                { "type": "text", "plain_text": "Work" }
            ]},
            "Due Date": { "type": "date", "date": null }
        }));

        let record = parse_page("p", &props).unwrap();
        assert_eq!(record.title, "Report");
        assert_eq!(record.description, "");
        assert_eq!(record.status, "completed");
        assert_eq!(record.parent_list_title, "Work");
        assert_eq!(record.due, None);
        assert_eq!(record.completion_date, None);
    }
}

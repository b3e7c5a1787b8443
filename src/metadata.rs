/// What kind of schema object a metadata file describes. This is a dispatch
/// key for restore ordering, not a validator: classification is an exact
/// prefix match on the statement's leading keywords and nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
    Other,
}

/// One schema object's create statement, read from a backup tree's metadata
/// directory. Consumed once when replayed.
#[derive(Debug, Clone)]
pub struct MetadataObject {
    pub file_name: String,
    pub object_name: String,
    pub kind: ObjectKind,
    pub sql: String,
}

/// Classify a metadata file by its leading keywords (case-sensitive).
/// Sequences, dictionaries and anything else unrecognized fall into `Other`
/// and are replayed generically after the table phase.
pub fn classify(content: &str, file_name: &str) -> MetadataObject {
    let kind = if content.starts_with("CREATE TABLE") {
        ObjectKind::Table
    } else if content.starts_with("CREATE MATERIALIZED VIEW") {
        ObjectKind::View
    } else {
        ObjectKind::Other
    };

    let object_name = file_name.strip_suffix(".sql").unwrap_or(file_name);

    MetadataObject {
        file_name: file_name.to_string(),
        object_name: object_name.to_string(),
        kind,
        sql: content.to_string(),
    }
}

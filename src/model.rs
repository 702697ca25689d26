use serde::Serialize;

use crate::store::ImportSummary;

#[derive(Debug, Clone, Serialize)]
pub struct ImportSource {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOptionsRecord {
    pub chunk_size: usize,
    pub delimiter: String,
    pub auto_key: Option<String>,
    pub fixed: Vec<String>,
}

/// Written by `import --manifest-path` after the run, whether it finished,
/// failed or was canceled.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_path: String,
    pub db_schema_version: String,
    pub bench: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub failure_reason: Option<String>,
    pub source: ImportSource,
    pub options: ImportOptionsRecord,
    pub summary: Option<ImportSummary>,
    pub committed_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serializes_source_and_outcome() {
        let manifest = ImportRunManifest {
            manifest_version: 1,
            run_id: "import-20240305T060708Z".to_string(),
            db_path: "benchrepo.sqlite".to_string(),
            db_schema_version: "1.0".to_string(),
            bench: "IOR".to_string(),
            status: "canceled".to_string(),
            started_at: "2024-03-05T06:07:08Z".to_string(),
            finished_at: "2024-03-05T06:07:09Z".to_string(),
            failure_reason: None,
            source: ImportSource {
                path: "ior.csv".to_string(),
                sha256: "ab".repeat(32),
                bytes: 42,
            },
            options: ImportOptionsRecord {
                chunk_size: 500,
                delimiter: ",".to_string(),
                auto_key: None,
                fixed: Vec::new(),
            },
            summary: None,
            committed_rows: 500,
        };

        let json = serde_json::to_value(&manifest).expect("manifest serializes");
        assert_eq!(json["source"]["bytes"], 42);
        assert_eq!(json["status"], "canceled");
        assert!(json["summary"].is_null());
        assert_eq!(json["committed_rows"], 500);
    }
}

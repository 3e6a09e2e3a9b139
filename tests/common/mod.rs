#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use tracker_query::{
    CompilationContext, CompilerConfig, ParametrizedSql, QueryResult, SqlCompiler, User,
    Workspace,
};

/// Two trackers sharing some field names with different storage types.
pub const WORKSPACE: &str = r#"{"trackers": [
    {
        "id": 1, "name": "bugs",
        "fields": [
            {"id": 101, "name": "summary", "type": "string"},
            {"id": 102, "name": "status", "type": "static_list"},
            {"id": 103, "name": "story_points", "type": "int"},
            {"id": 104, "name": "due", "type": "date"},
            {"id": 105, "name": "assignee", "type": "user_list"},
            {"id": 106, "name": "category", "type": "static_list"},
            {"id": 107, "name": "details", "type": "text"},
            {"id": 108, "name": "cost", "type": "float", "readable_by": [99]},
            {"id": 109, "name": "mixed", "type": "int"}
        ],
        "semantics": {"title": 101, "description": 107, "status": 102, "contributor": 105}
    },
    {
        "id": 2, "name": "tasks",
        "fields": [
            {"id": 201, "name": "summary", "type": "text"},
            {"id": 202, "name": "status", "type": "static_list"},
            {"id": 203, "name": "story_points", "type": "float"},
            {"id": 204, "name": "due", "type": "date_time"},
            {"id": 206, "name": "category", "type": "static_list"},
            {"id": 209, "name": "attachment", "type": "file"},
            {"id": 210, "name": "mixed", "type": "string"}
        ],
        "semantics": {"title": 201, "status": 202}
    }
]}"#;

pub const TRACKERS: [u64; 2] = [1, 2];

pub fn workspace() -> Workspace {
    Workspace::from_json_str(WORKSPACE).unwrap()
}

/// Alice, on 2024-03-01 at 12:30 UTC.
pub fn context() -> CompilationContext {
    CompilationContext::new(User::new(7, "alice"))
        .with_now(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
}

pub fn compiler() -> SqlCompiler<Workspace> {
    SqlCompiler::new(workspace())
}

pub fn compiler_with(config: CompilerConfig) -> SqlCompiler<Workspace> {
    SqlCompiler::with_config(workspace(), config)
}

pub fn compile(query: &str) -> QueryResult<ParametrizedSql> {
    compiler()
        .compile_query(query, &TRACKERS, &context())
        .map(|compiled| compiled.to_sql())
}

mod common;

use common::{compile, compiler, compiler_with, context, TRACKERS};
use sea_query::Value;
use tracker_query::error::{
    ClauseFault, FieldNotFoundFault, InvalidComparisonReason, InvalidQueryFault, ResolveFault,
};
use tracker_query::{
    CompilationContext, CompilerConfig, CrossTrackerReport, QueryError, SqlCompiler, SqlDialect,
    Subject, User, Workspace,
};

fn clause_fault(query: &str) -> ClauseFault {
    match compile(query) {
        Err(QueryError::InvalidQuery(InvalidQueryFault { fault, .. })) => fault,
        other => panic!("expected an invalid query for `{query}`, got {other:?}"),
    }
}

#[test]
fn test_open_status_and_title() {
    let sql = compile(r#"@status = OPEN() AND @title = "foo""#).unwrap();

    assert!(sql.sql.contains("LEFT JOIN (SELECT"));
    assert!(sql.sql.contains("cv.field_id IN (102, 202)"));
    assert!(sql.sql.contains(
        "`open_meta_status`.`changeset_id` IS NOT NULL AND `cvt_meta_title`.`value` = ?"
    ));
    assert_eq!(sql.parameters, vec![Value::from("foo")]);
}

#[test]
fn test_field_referenced_twice_is_joined_once() {
    let sql = compile("story_points > 3 OR story_points < 1 OR story_points = 2").unwrap();

    for alias in ["tf_story_points", "cvi_story_points", "cvf_story_points"] {
        assert_eq!(sql.sql.matches(&format!("AS `{alias}`")).count(), 1, "{alias}");
    }
    assert_eq!(sql.parameters.len(), 3);
}

#[test]
fn test_in_values_are_bound_in_order() {
    let sql = compile(r#"category IN("ui", "db", "api") AND summary = "x""#).unwrap();
    assert!(sql.sql.contains("`bsv`.`label` IN (?, ?, ?)"));
    assert_eq!(
        sql.parameters,
        vec![
            Value::from("ui"),
            Value::from("db"),
            Value::from("api"),
            Value::from("x"),
        ]
    );

    let sql = compile(r#"summary = "x" AND category NOT IN("a", "b")"#).unwrap();
    assert_eq!(
        sql.parameters,
        vec![Value::from("x"), Value::from("a"), Value::from("b")]
    );
}

#[test]
fn test_status_accepts_only_open_and_labels() {
    for query in [
        "@status = OPEN()",
        "@status != OPEN()",
        r#"@status = "Done""#,
        r#"@status != "Done""#,
    ] {
        assert!(compile(query).is_ok(), "{query}");
    }

    for query in [
        r#"@status BETWEEN("a", "b")"#,
        r#"@status IN("a")"#,
        "@status = MYSELF()",
        "@status = NOW()",
        r#"@status < "a""#,
        r#"@status = """#,
    ] {
        assert!(
            matches!(clause_fault(query), ClauseFault::InvalidComparison(_)),
            "{query}"
        );
    }
}

#[test]
fn test_unreadable_field_is_reported_as_missing() {
    assert_eq!(
        clause_fault("cost = 3"),
        ClauseFault::Resolve(ResolveFault::FieldNotFound(FieldNotFoundFault {
            subject: Subject::field("cost"),
        }))
    );
    assert_eq!(
        clause_fault("nonexistent = 3"),
        ClauseFault::Resolve(ResolveFault::FieldNotFound(FieldNotFoundFault {
            subject: Subject::field("nonexistent"),
        }))
    );

    let allowed = CompilationContext::new(User::new(99, "bob")).with_now(context().now);
    assert!(compiler().compile_query("cost = 3", &TRACKERS, &allowed).is_ok());
}

#[test]
fn test_resolution_faults() {
    assert!(matches!(
        clause_fault("mixed = 1"),
        ClauseFault::Resolve(ResolveFault::IncompatibleFieldTypes { .. })
    ));
    assert!(matches!(
        clause_fault(r#"attachment = "x""#),
        ClauseFault::Resolve(ResolveFault::UnsupportedFieldType { .. })
    ));
}

#[test]
fn test_bare_metadata_name_falls_back_to_metadata() {
    let sql = compile(r#"title = "foo""#).unwrap();
    assert!(sql.sql.contains("`cvt_meta_title`.`value` = ?"));
    assert!(sql.sql.contains("tf_meta_title.field_id IN (101, 201)"));
}

#[test]
fn test_dates_bind_one_timestamp() {
    // 2024-01-10 00:00:00 UTC
    let sql = compile(r#"due = "2024-01-10""#).unwrap();
    assert_eq!(sql.parameters, vec![Value::BigInt(Some(1_704_844_800))]);

    let sql = compile(r#"@submitted_on BETWEEN("2024-01-10", NOW() - 1w)"#).unwrap();
    assert_eq!(sql.parameters.len(), 2);

    // One of the trackers stores dates only
    assert_eq!(
        clause_fault(r#"due = "2024-01-10 08:15""#),
        ClauseFault::InvalidComparison(tracker_query::error::InvalidComparisonFault {
            subject: "due".to_string(),
            operator: "=".to_string(),
            reason: InvalidComparisonReason::TimeNotSupported("2024-01-10 08:15".to_string()),
        })
    );
}

#[test]
fn test_current_user_binds_the_user_id() {
    let sql = compile("@assigned_to = MYSELF() OR @submitted_by = MYSELF()").unwrap();
    assert_eq!(
        sql.parameters,
        vec![Value::BigInt(Some(7)), Value::BigInt(Some(7))]
    );
}

#[test]
fn test_current_user_id_out_of_range_is_refused() {
    let context = CompilationContext::new(User::new(u64::MAX, "root"));
    let error = compiler()
        .compile_query("@assigned_to = MYSELF()", &TRACKERS, &context)
        .unwrap_err();
    match error {
        QueryError::InvalidQuery(InvalidQueryFault {
            fault: ClauseFault::InvalidComparison(fault),
            ..
        }) => assert_eq!(fault.reason, InvalidComparisonReason::UserIdOutOfRange(u64::MAX)),
        other => panic!("expected an invalid comparison, got {other:?}"),
    }
}

#[test]
fn test_artifact_links() {
    let sql = compile(r#"IS LINKED TO TRACKER = "tasks" AND WITHOUT PARENT"#).unwrap();
    assert!(sql.sql.contains("`artifact`.`id` IN (SELECT `linking`.`id`"));
    assert!(sql.sql.contains("`artifact`.`id` NOT IN (SELECT `link`.`artifact_id`"));
    assert_eq!(sql.parameters, vec![Value::from("tasks")]);

    assert!(matches!(
        clause_fault("WITH PARENT ARTIFACT = 0"),
        ClauseFault::InvalidComparison(_)
    ));
}

#[test]
fn test_user_text_never_reaches_the_sql() {
    let sql = compile(r#"summary = "x' OR 1=1 --" AND category IN("'; DROP TABLE user; --")"#).unwrap();
    assert!(!sql.sql.contains("1=1"));
    assert!(!sql.sql.contains("DROP"));
    assert_eq!(sql.parameters.len(), 2);
}

#[test]
fn test_and_binds_tighter_than_or() {
    let sql = compile("story_points = 1 OR story_points = 2 AND story_points = 3").unwrap();
    assert!(sql.sql.contains("= ? OR (COALESCE("));
    assert_eq!(
        sql.parameters,
        vec![
            Value::BigInt(Some(1)),
            Value::BigInt(Some(2)),
            Value::BigInt(Some(3)),
        ]
    );
}

#[test]
fn test_count_and_pagination() {
    let compiled = compiler()
        .compile_query(r#"@title = "foo""#, &TRACKERS, &context())
        .unwrap();

    let count = compiled.count_sql();
    assert!(count.sql.starts_with("SELECT COUNT(DISTINCT artifact.id) FROM `tracker_artifact`"));
    assert_eq!(count.parameters, vec![Value::from("foo")]);

    let page = compiled.paginated_sql(25, 50);
    assert!(page.sql.ends_with("ORDER BY `artifact`.`id` DESC LIMIT ? OFFSET ?"));
    assert_eq!(
        page.parameters,
        vec![Value::from("foo"), Value::from(25_u64), Value::from(50_u64)]
    );
}

#[test]
fn test_sqlite_dialect() {
    let config = CompilerConfig {
        dialect: SqlDialect::Sqlite,
        ..CompilerConfig::default()
    };
    let sql = compiler_with(config)
        .compile_query(r#"summary = "x""#, &TRACKERS, &context())
        .unwrap()
        .to_sql();
    assert!(sql.sql.starts_with(r#"SELECT DISTINCT "artifact"."id" FROM "tracker_artifact" AS "artifact""#));
    assert!(sql.sql.contains(r#""cvt_summary"."value" = ?"#));
}

#[test]
fn test_report_ignores_unknown_trackers() {
    let report = CrossTrackerReport::new(1, r#"summary = "x""#, vec![1, 42]);
    let compiled = compiler().compile_report(&report, &context()).unwrap();
    assert_eq!(compiled.trackers(), &[1]);

    let sql = compiled.to_sql().sql;
    assert!(sql.contains("artifact.tracker_id IN (1)"));
    assert!(sql.contains("tf_summary.field_id IN (101)"));
}

#[test]
fn test_empty_scope_and_complexity_limit() {
    assert_eq!(
        compiler().compile_query(r#"summary = "x""#, &[], &context()).unwrap_err(),
        QueryError::EmptyScope
    );

    let config = CompilerConfig {
        max_comparisons: 3,
        ..CompilerConfig::default()
    };
    let error = compiler_with(config)
        .compile_query(
            "story_points = 1 OR story_points = 2 OR story_points = 3 OR WITH PARENT",
            &TRACKERS,
            &context(),
        )
        .unwrap_err();
    assert_eq!(error, QueryError::TooComplex { found: 4, limit: 3 });
}

#[test]
fn test_static_list_selection_spans_trackers() {
    let sql = compiler()
        .compile_static_list_selection("category", &[3], &TRACKERS, &context())
        .unwrap();
    assert!(sql.sql.contains("tf_sel_category.id IN (106, 206)"));
    assert!(sql.sql.contains("`open_value_category`"));
    assert!(sql.sql.contains("`color_value_category`"));
    assert_eq!(sql.parameters, vec![Value::BigInt(Some(3))]);

    let error = compiler()
        .compile_static_list_selection("nope", &[3], &TRACKERS, &context())
        .unwrap_err();
    assert!(matches!(
        error,
        QueryError::InvalidQuery(InvalidQueryFault {
            fault: ClauseFault::Resolve(ResolveFault::FieldNotFound(_)),
            ..
        })
    ));
}

#[test]
fn test_oversized_queries_are_refused_while_parsing() {
    let query = vec![r#"summary = "x""#; 200_000].join(" AND ");
    assert_eq!(
        compile(&query).unwrap_err(),
        QueryError::TooComplex { found: 51, limit: 50 }
    );

    let report = CrossTrackerReport::new(1, vec!["story_points = 1"; 5_000].join(" OR "), vec![1]);
    assert!(matches!(
        compiler().compile_report(&report, &context()),
        Err(QueryError::TooComplex { limit: 50, .. })
    ));

    let nested = format!("{}summary = \"x\"{}", "(".repeat(100_000), ")".repeat(100_000));
    match compile(&nested) {
        Err(QueryError::Syntax(error)) => {
            assert_eq!(error.message, "Parentheses cannot be nested more than 64 levels deep")
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_trackers_without_the_field_never_match() {
    let workspace = Workspace::from_json_str(
        r#"{"trackers": [
            {"id": 1, "name": "bugs", "fields": [
                {"id": 11, "name": "category", "type": "static_list"},
                {"id": 12, "name": "effort", "type": "int"}
            ]},
            {"id": 2, "name": "tasks", "fields": [
                {"id": 21, "name": "summary", "type": "string"}
            ]}
        ]}"#,
    )
    .unwrap();
    let compiler = SqlCompiler::new(workspace);

    for query in [
        r#"category = """#,
        r#"category != "ui""#,
        r#"category NOT IN("ui")"#,
        r#"effort = """#,
        "effort != 3",
    ] {
        let sql = compiler.compile_query(query, &TRACKERS, &context()).unwrap().to_sql();
        assert!(
            sql.sql.contains("(artifact.tracker_id NOT IN (2)) AND "),
            "{query}: {}",
            sql.sql
        );
    }

    let sql = compiler
        .compile_query(r#"summary = "" OR effort = """#, &TRACKERS, &context())
        .unwrap()
        .to_sql();
    assert!(sql.sql.contains("(artifact.tracker_id NOT IN (1)) AND "));
    assert!(sql.sql.contains("(artifact.tracker_id NOT IN (2)) AND "));
    assert!(sql.parameters.is_empty());

    // Fields present everywhere need no restriction
    let sql = compile(r#"category = """#).unwrap();
    assert!(!sql.sql.contains("tracker_id NOT IN"));
}

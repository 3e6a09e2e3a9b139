use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tracker_query::lexer::Lexer;
use tracker_query::parser::Parser;
use tracker_query::{CompilationContext, SqlCompiler, User, Workspace};

const WORKSPACE: &str = r#"{"trackers": [
    {
        "id": 1, "name": "bugs",
        "fields": [
            {"id": 101, "name": "summary", "type": "string"},
            {"id": 102, "name": "status", "type": "static_list"},
            {"id": 103, "name": "story_points", "type": "int"},
            {"id": 104, "name": "due", "type": "date"},
            {"id": 105, "name": "assignee", "type": "user_list"},
            {"id": 106, "name": "category", "type": "static_list"}
        ],
        "semantics": {"title": 101, "status": 102, "contributor": 105}
    },
    {
        "id": 2, "name": "tasks",
        "fields": [
            {"id": 201, "name": "summary", "type": "text"},
            {"id": 202, "name": "status", "type": "static_list"},
            {"id": 203, "name": "story_points", "type": "float"},
            {"id": 204, "name": "due", "type": "date_time"}
        ],
        "semantics": {"title": 201, "status": 202}
    }
]}"#;

fn test_cases() -> Vec<(&'static str, &'static str)> {
    vec![
        ("simple", r#"@status = OPEN()"#),
        ("medium", r#"@status = OPEN() AND @title = "crash" AND story_points > 3"#),
        (
            "complex",
            r#"(@title = "Release Plan" OR summary != "") AND due > NOW() - 1w AND @assigned_to = MYSELF() AND category NOT IN("ui", "db") OR WITH PARENT TRACKER = "epics""#,
        ),
        (
            "repeated_subject",
            r#"story_points = 1 OR story_points = 2 OR story_points = 3 OR story_points = 5 OR story_points = 8 OR story_points BETWEEN(13, 21)"#,
        ),
    ]
}

fn create_compiler() -> SqlCompiler<Workspace> {
    SqlCompiler::new(Workspace::from_json_str(WORKSPACE).expect("workspace should load"))
}

fn context() -> CompilationContext {
    CompilationContext::new(User::new(7, "alice"))
        .with_now(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, query) in test_cases() {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &query, |b, &query| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(query)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for (name, query) in test_cases() {
        let tokens: Vec<_> = Lexer::new(query).collect();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(tokens));
                match parser.parse() {
                    Ok(ast) => black_box(ast),
                    Err(error) => panic!("parse failed: {error}"),
                }
            })
        });
    }

    group.finish();
}

fn benchmark_sql_compiler(c: &mut Criterion) {
    let compiler = create_compiler();
    let context = context();
    let mut group = c.benchmark_group("sql_compiler_performance");

    for (name, query) in test_cases() {
        let tokens: Vec<_> = Lexer::new(query).collect();
        let ast = Parser::new(&tokens).parse().expect("query should parse");

        group.bench_with_input(BenchmarkId::new("compile", name), &ast, |b, ast| {
            b.iter(|| {
                match compiler.compile(black_box(ast), &[1, 2], &context) {
                    Ok(compiled) => black_box(compiled.to_sql()),
                    Err(error) => panic!("compilation failed: {error}"),
                }
            })
        });
    }

    group.finish();
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let compiler = create_compiler();
    let context = context();
    let mut group = c.benchmark_group("end_to_end_performance");

    for (name, query) in test_cases() {
        group.bench_with_input(BenchmarkId::new("full_pipeline", name), &query, |b, &query| {
            b.iter(|| {
                let compiled = compiler
                    .compile_query(black_box(query), &[1, 2], &context)
                    .expect("query should compile");
                black_box((compiled.to_sql(), compiled.count_sql(), compiled.paginated_sql(50, 0)))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_sql_compiler,
    benchmark_end_to_end
);
criterion_main!(benches);

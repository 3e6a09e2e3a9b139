use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracker_query::metadata::TrackerId;
use tracker_query::{
    CompilationContext, CompiledQuery, CompilerConfig, CrossTrackerReport, FieldMetadataProvider,
    QueryError, SqlCompiler, User, Workspace,
};

const HISTORY_FILE: &str = ".tracker_query_history";

/// Compiles cross tracker queries typed at the prompt and prints the generated SQL.
#[derive(Parser)]
#[command(name = "tracker-query")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Workspace description: trackers, fields, semantics and permissions
    #[arg(short, long, default_value = "workspace.json")]
    workspace: PathBuf,

    /// Compiler settings (dialect, max_comparisons, timezone_offset_minutes)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trackers to search in, every tracker of the workspace when omitted
    #[arg(short, long = "tracker")]
    trackers: Vec<TrackerId>,

    /// Id of the user running the queries, 0 for anonymous
    #[arg(long, default_value_t = 0)]
    user_id: u64,

    /// Name of the user running the queries
    #[arg(long, default_value = "anonymous")]
    user_name: String,

    /// Number of artifacts per page of the paginated statement
    #[arg(long, default_value_t = 50)]
    page_size: u64,

    /// Compile this query and exit instead of starting the prompt
    #[arg(short, long)]
    query: Option<String>,
}

struct Session {
    compiler: SqlCompiler<Workspace>,
    trackers: Vec<TrackerId>,
    user: User,
    page_size: u64,
}

impl Session {
    fn context(&self) -> Result<CompilationContext> {
        let timezone = self.compiler.config().timezone()?;
        Ok(CompilationContext::new(self.user.clone())
            .with_now(Utc::now())
            .with_timezone(timezone))
    }

    fn run(&self, query: &str) -> Result<()> {
        let report = CrossTrackerReport::new(0, query, self.trackers.clone());
        match self.compiler.compile_report(&report, &self.context()?) {
            Ok(compiled) => self.print(&compiled),
            Err(QueryError::Syntax(error)) => {
                println!("Syntax error: {}", error.message);
                if let Some(span) = error.span {
                    println!("  {query}");
                    println!("  {}{}", " ".repeat(span.start), "^".repeat((span.end - span.start).max(1)));
                }
            }
            Err(error) => println!("Error: {error}"),
        }
        Ok(())
    }

    /// `.select <field> <artifact id>...`
    fn select(&self, arguments: &str) -> Result<()> {
        let mut words = arguments.split_whitespace();
        let Some(field) = words.next() else {
            println!("Usage: .select <field> <artifact id>...");
            return Ok(());
        };
        let artifacts: Vec<i64> = match words.map(str::parse).collect() {
            Ok(artifacts) => artifacts,
            Err(error) => {
                println!("Error: artifact ids must be integers ({error})");
                return Ok(());
            }
        };

        let context = self.context()?;
        match self
            .compiler
            .compile_static_list_selection(field, &artifacts, &self.trackers, &context)
        {
            Ok(select) => {
                println!("\n[Select]\n{}", select.sql);
                println!("[Parameters] {:?}\n", select.parameters);
            }
            Err(error) => println!("Error: {error}"),
        }
        Ok(())
    }

    fn print(&self, compiled: &CompiledQuery) {
        let search = compiled.to_sql();
        println!("\n[SQL]\n{}", search.sql);
        println!("[Parameters] {:?}", search.parameters);

        let count = compiled.count_sql();
        println!("\n[Count]\n{}", count.sql);

        let page = compiled.paginated_sql(self.page_size, 0);
        println!("\n[First page]\n{}", page.sql);
        println!("[Parameters] {:?}\n", page.parameters);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tracker_query=info")),
        )
        .init();

    let cli = Cli::parse();

    let workspace = Workspace::from_json_file(&cli.workspace)
        .with_context(|| format!("cannot load workspace {}", cli.workspace.display()))?;
    let config = match &cli.config {
        Some(path) => CompilerConfig::from_json_file(path)
            .with_context(|| format!("cannot load compiler settings {}", path.display()))?,
        None => CompilerConfig::default(),
    };

    let trackers = if cli.trackers.is_empty() {
        workspace.trackers.iter().map(|tracker| tracker.id).collect()
    } else {
        cli.trackers.clone()
    };
    let in_scope = workspace.list_trackers_in_scope(&CrossTrackerReport::new(0, "", trackers.clone()));
    info!(
        trackers = ?in_scope,
        dialect = ?config.dialect,
        "loaded {} tracker(s) from {}",
        workspace.trackers.len(),
        cli.workspace.display()
    );

    let user = if cli.user_id == 0 {
        User::anonymous()
    } else {
        User::new(cli.user_id, cli.user_name.clone())
    };
    let session = Session {
        compiler: SqlCompiler::with_config(workspace, config),
        trackers,
        user,
        page_size: cli.page_size,
    };

    if let Some(query) = &cli.query {
        return session.run(query);
    }

    println!("Cross tracker query compiler. Type a query, `.help` or `.quit`.");
    let mut editor = DefaultEditor::new()?;
    if editor.load_history(HISTORY_FILE).is_err() {
        info!("no previous history");
    }

    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match line {
                    ".quit" | ".exit" => break,
                    ".help" => print_help(),
                    query => match query.strip_prefix(".select ") {
                        Some(arguments) => session.select(arguments)?,
                        None => session.run(query)?,
                    },
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        }
    }

    if let Err(error) = editor.save_history(HISTORY_FILE) {
        warn!(%error, "cannot save history");
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"Examples:
  @status = OPEN() AND @title = "crash"
  story_points BETWEEN(3, 8) OR @assigned_to = MYSELF()
  category NOT IN("ui", "db") AND @submitted_on > NOW() - 1w
  WITH PARENT TRACKER = "epics"
  .select category 12 13    (labels and colors of a static list for these artifacts)
Set RUST_LOG=tracker_query=debug to trace compilation."#
    );
}

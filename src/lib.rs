//! Compiler of cross tracker advanced queries into parametrized SQL.
//!
//! ```text
//! query text ──lexer/parser──▶ Expression ──resolver + validator──▶ builders ──▶ SQL + parameters
//! ```

pub mod ast;
pub mod builder;
pub mod config;
pub mod date_literal;
pub mod duck_typed_field;
pub mod error;
pub mod lexer;
pub mod metadata;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod sql_compiler;
pub mod token;
pub mod validator;

pub use ast::{Comparison, ComparisonType, Expression, Metadata, Subject, ValueWrapper};
pub use config::{CompilerConfig, ConfigError, Workspace};
pub use error::{QueryError, QueryResult};
pub use metadata::{CrossTrackerReport, FieldMetadataProvider, PermissionChecker, User};
pub use parser::parse;
pub use sql_compiler::{CompilationContext, CompiledQuery, ParametrizedSql, SqlCompiler, SqlDialect};

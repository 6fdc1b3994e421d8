//! Minimal CLI: schema definition → (describe | check)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::{json, Value};

use json_params::{definition, ParamError, Registry, Schema};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile a JSON parameter schema definition, then document it or check documents against it
#[derive(Parser, Debug)]
#[command(name = "json-params", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile the schema and print its parameter documentation as JSON
    Describe(DescribeOut),
    /// coerce and validate input documents against the schema
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema definition file ({"params": [...]})
    #[arg(long, short)]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/params)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is checked
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file for parsed results (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// only print the per-document status lines
    #[arg(long)]
    quiet: bool,
}

/// One input document and where it came from.
#[derive(Debug)]
struct Document {
    source: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn compile(&self) -> Result<Schema> {
        let bytes = std::fs::read(&self.schema)
            .with_context(|| format!("failed to read schema file {}", self.schema.display()))?;
        let schema = definition::schema_from_slice(&bytes, Registry::builtin())
            .with_context(|| format!("failed to compile schema {}", self.schema.display()))?;
        tracing::info!(
            schema = %self.schema.display(),
            params = schema.parameters().len(),
            "schema compiled"
        );
        Ok(schema)
    }
}

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let label = format!("{source_path_str}:{}", line_no + 1);
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse JSON line ({label})"))?;
                    self.select(label, value, &mut documents)?;
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                self.select(source_path_str, value, &mut documents)?;
            }
        }
        Ok(documents)
    }

    /// Apply the JSON pointer and jq filter, in that order.
    fn select(&self, source: String, value: Value, out: &mut Vec<Document>) -> Result<()> {
        let value = match self.json_pointer.as_deref() {
            None => value,
            Some(ptr) => value
                .pointer(ptr)
                .cloned()
                .ok_or_else(|| anyhow!("JSON pointer {ptr} matched nothing in {source}"))?,
        };
        match self.jq_expr.as_deref() {
            None => out.push(Document { source, value }),
            Some(jq_expr) => {
                let selected = crate::jq_exec::select_documents(jq_expr, &value)
                    .with_context(|| format!("failed to apply jq expression to {source}"))?;
                for (i, value) in selected.into_iter().enumerate() {
                    out.push(Document { source: format!("{source}#{i}"), value });
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Describe(target) => {
                let schema = target.schema_settings.compile()?;
                let doc = serde_json::to_string_pretty(&schema.describe())?;
                write_output(target.out.as_deref(), &doc)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                let schema = target.schema_settings.compile()?;
                let documents = target.input_settings.load_documents()?;
                tracing::info!(documents = documents.len(), "checking documents");

                // The compiled schema is immutable, so every worker shares it.
                let outcomes: Vec<Result<Value, ParamError>> = documents
                    .par_iter()
                    .map(|doc| schema.parse_value(&doc.value))
                    .collect();

                let mut failures = 0usize;
                let mut report = Vec::with_capacity(outcomes.len());
                for (doc, outcome) in documents.iter().zip(outcomes) {
                    match outcome {
                        Ok(params) => {
                            eprintln!("{} {}", "ok".green().bold(), doc.source);
                            report.push(json!({ "source": doc.source, "params": params }));
                        }
                        Err(error) => {
                            failures += 1;
                            eprintln!("{} {}: {error}", "error".red().bold(), doc.source);
                            report.push(json!({
                                "source": doc.source,
                                "error": error.to_string(),
                                "fields": error.attr_names(),
                            }));
                        }
                    }
                }
                let failed = if failures == 0 {
                    failures.to_string().green()
                } else {
                    failures.to_string().red()
                };
                eprintln!("{} documents, {failed} failed", documents.len());

                if !target.quiet {
                    let src = serde_json::to_string_pretty(&report)?;
                    write_output(target.out.as_deref(), &src)?;
                }
                Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents)
                .with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let mut matched_any = false;
        for entry in glob::glob(pattern)? {
            out.push(entry?);
            matched_any = true;
        }
        if !matched_any {
            bail!("glob pattern matched no files: {pattern}");
        }
    }

    Ok(out)
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::service::{ScriptRequest, ScriptingWorkspace};
use crate::workspace::{SchemaTypeProvider, WorkflowSchema, WorkspaceKey};

#[derive(Parser)]
#[command(name = "wfscript")]
#[command(about = "wfscript - editor services for workflow scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// The workflow schema and script every analysis command needs
#[derive(Args, Debug, Clone)]
pub struct ScriptArgs {
    /// Workflow schema (JSON)
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,

    /// Script file
    pub script: PathBuf,

    /// Workspace key (default: derived from the schema's definition id)
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Document name inside the workspace
    #[arg(short = 'd', long = "document", default_value = "Script")]
    pub document: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report diagnostics for a script
    Analyze {
        #[command(flatten)]
        script: ScriptArgs,
    },

    /// List completion candidates at a position
    Complete {
        #[command(flatten)]
        script: ScriptArgs,

        /// Character offset into the script
        #[arg(short = 'p', long = "position")]
        position: usize,
    },

    /// Describe the symbol at a position
    Hover {
        #[command(flatten)]
        script: ScriptArgs,

        /// Character offset into the script
        #[arg(short = 'p', long = "position")]
        position: usize,
    },

    /// Show signature help for the call around a position
    Signatures {
        #[command(flatten)]
        script: ScriptArgs,

        /// Character offset into the script
        #[arg(short = 'p', long = "position")]
        position: usize,
    },

    /// Format a script
    Format {
        /// Script file
        script: PathBuf,

        /// Rewrite the file instead of printing the result
        #[arg(short = 'w', long = "write")]
        write: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments (for hosts that embed the tool)
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before executing any command
    let config = Config::builder()
        .config_path(cli.config.as_ref().map(PathBuf::from))
        .build()?;
    init_logging(&config);

    let config = Arc::new(config);
    let workspace = ScriptingWorkspace::new(SchemaTypeProvider, Arc::clone(&config));
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Analyze { script } => {
            let input = ScriptInput::load(&script).await?;
            let diagnostics = workspace.analyze(&input.request(&script), &cancel).await?;
            print_json(&diagnostics)?;
        }
        Commands::Complete { script, position } => {
            let input = ScriptInput::load(&script).await?;
            let candidates = workspace
                .complete(&input.request(&script), position, &cancel)
                .await?;
            print_json(&candidates)?;
        }
        Commands::Hover { script, position } => {
            let input = ScriptInput::load(&script).await?;
            let info = workspace.hover(&input.request(&script), position, &cancel).await?;
            print_json(&info)?;
        }
        Commands::Signatures { script, position } => {
            let input = ScriptInput::load(&script).await?;
            let help = workspace
                .signatures(&input.request(&script), position, &cancel)
                .await?;
            print_json(&help)?;
        }
        Commands::Format { script, write } => {
            let text = read_file(&script).await?;
            let formatted = workspace.format(&text).await?;
            if write {
                if formatted != text {
                    tokio::fs::write(&script, &formatted)
                        .await
                        .with_context(|| format!("Failed to write {}", script.display()))?;
                    println!("Formatted {}", script.display());
                }
            } else {
                print!("{}", formatted);
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    // Logs go to stderr; stdout carries the command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

struct ScriptInput {
    schema: WorkflowSchema,
    key: WorkspaceKey,
    text: String,
}

impl ScriptInput {
    async fn load(args: &ScriptArgs) -> Result<Self> {
        let raw = read_file(&args.schema).await?;
        let schema: WorkflowSchema = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid workflow schema in {}", args.schema.display()))?;

        let key = match &args.key {
            Some(key) => WorkspaceKey::new(key.as_str())?,
            None => WorkspaceKey::from_workflow_id(&schema.definition_id)?,
        };
        let text = read_file(&args.script).await?;

        Ok(Self { schema, key, text })
    }

    fn request<'a>(&'a self, args: &'a ScriptArgs) -> ScriptRequest<'a, WorkflowSchema> {
        ScriptRequest::new(&self.schema, &self.key, &args.document, &self.text)
    }
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_command() {
        let cli = Cli::try_parse_from([
            "wfscript",
            "complete",
            "--schema",
            "schema.json",
            "script.ws",
            "--position",
            "12",
            "--config",
            "custom.toml",
        ])
        .expect("arguments parse");

        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        match cli.command {
            Commands::Complete { script, position } => {
                assert_eq!(position, 12);
                assert_eq!(script.schema, PathBuf::from("schema.json"));
                assert_eq!(script.script, PathBuf::from("script.ws"));
                assert_eq!(script.document, "Script");
                assert!(script.key.is_none());
            }
            _ => panic!("expected the complete command"),
        }
    }

    #[test]
    fn test_position_is_required() {
        let result = Cli::try_parse_from(["wfscript", "hover", "-s", "schema.json", "script.ws"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_format_rewrites_file() {
        let dir = std::env::temp_dir().join(format!("wfscript-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let script = dir.join("script.ws");
        std::fs::write(&script, "var x=1;").expect("write script");
        let config = dir.join("wfscript.toml");
        std::fs::write(&config, "[formatter]\nindent_size = 2\n").expect("write config");

        let args = vec![
            "wfscript".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "format".to_string(),
            "--write".to_string(),
            script.display().to_string(),
        ];
        run_cli_from_args(args).await.expect("format succeeds");

        let formatted = std::fs::read_to_string(&script).expect("read script");
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(formatted, "var x = 1;\n");
    }

    #[tokio::test]
    async fn test_missing_schema_is_reported() {
        let args = vec![
            "wfscript".to_string(),
            "analyze".to_string(),
            "--schema".to_string(),
            "/nonexistent/schema.json".to_string(),
            "/nonexistent/script.ws".to_string(),
        ];
        let err = run_cli_from_args(args).await.expect_err("missing files");
        assert!(format!("{:#}", err).contains("Failed to read"));
    }
}

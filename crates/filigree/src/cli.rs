//! Clap CLI definitions for the `filigree` command.
//!
//! This is the boundary adapter (spec §6/C11): a thin facade that parses
//! arguments, resolves a [`crate::context::RuntimeContext`], and dispatches
//! into the storage engine. No business logic lives here.

use clap::{Args, Parser, Subcommand};

/// filigree -- agent-native issue tracker.
#[derive(Parser, Debug)]
#[command(
    name = "filigree",
    about = "Agent-native issue tracker",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root (default: auto-discover `.filigree/` upward from cwd).
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Actor name for audit trail (default: $FILIGREE_ACTOR, git user.name, $USER).
    #[arg(long, global = true, env = "FILIGREE_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug logging on stderr.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new `.filigree/` project directory.
    Init(InitArgs),
    /// Create a new issue.
    #[command(alias = "new")]
    Create(CreateArgs),
    /// Show issue details.
    #[command(alias = "view")]
    Show(ShowArgs),
    /// List/search issues.
    List(ListArgs),
    /// Update issue fields.
    Update(UpdateArgs),
    /// Close an issue.
    Close(CloseArgs),
    /// Reopen a closed issue.
    Reopen(ReopenArgs),
    /// Undo the most recent reversible change on an issue.
    Undo(UndoArgs),
    /// Claim an issue for an assignee.
    Claim(ClaimArgs),
    /// Atomically claim the highest-priority ready issue.
    ClaimNext(ClaimNextArgs),
    /// Release a claimed issue.
    Release(ReleaseArgs),
    /// Dependency graph operations.
    Dep(DepArgs),
    /// List issues with no outstanding blockers.
    Ready(ReadyArgs),
    /// List issues blocked on an outstanding dependency.
    Blocked,
    /// Compute the longest blocking chain in the dependency graph.
    CriticalPath,
    /// Planning tree operations (milestone/phase/step).
    Plan(PlanArgs),
    /// Comment operations.
    Comment(CommentArgs),
    /// Label operations.
    Label(LabelArgs),
    /// Batch operations across multiple issues.
    Batch(BatchArgs),
    /// Event log / change-feed operations.
    Events(EventsArgs),
    /// File and scan-finding operations.
    File(FileArgs),
    /// Template/workflow introspection.
    Template(TemplateArgs),
    /// Project configuration.
    Config(ConfigArgs),
    /// Flow analytics (cycle time, lead time, throughput).
    Analytics(AnalyticsArgs),
    /// Regenerate `.filigree/context.md`.
    Summary,
    /// Check project health (schema version, config validity).
    Doctor,
    /// Generate shell completion scripts.
    Completion(CompletionArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Issue id prefix for this project (e.g. `demo`).
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Issue title.
    pub title: String,
    #[arg(long = "type", default_value = "task")]
    pub issue_type: String,
    #[arg(long)]
    pub priority: Option<i32>,
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    /// Arbitrary field assignments as `key=json_value`, repeatable.
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, serde_json::Value)>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long = "type")]
    pub issue_type: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub parent: Option<String>,
    /// Free-text search across title, description, and notes.
    #[arg(long)]
    pub query: Option<String>,
    #[arg(long, default_value_t = 100)]
    pub limit: i64,
    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<i32>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Pass an empty string to clear the parent.
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, serde_json::Value)>,
    /// Skip transition validation (administrative override).
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CloseArgs {
    pub id: String,
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReopenArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct UndoArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ClaimArgs {
    pub id: String,
    pub assignee: String,
}

#[derive(Args, Debug)]
pub struct ClaimNextArgs {
    pub assignee: String,
    #[arg(long = "type")]
    pub issue_type: Option<String>,
    #[arg(long)]
    pub priority_min: Option<i32>,
    #[arg(long)]
    pub priority_max: Option<i32>,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommands,
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add a blocking dependency: `issue_id` is blocked by `depends_on_id`.
    Add { issue_id: String, depends_on_id: String },
    /// Remove a blocking dependency.
    Remove { issue_id: String, depends_on_id: String },
}

#[derive(Args, Debug)]
pub struct ReadyArgs {
    #[arg(long = "type")]
    pub issue_type: Option<String>,
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub command: PlanCommands,
}

#[derive(Subcommand, Debug)]
pub enum PlanCommands {
    /// Create a milestone/phase/step plan from a JSON payload file.
    Create {
        /// Path to a JSON file shaped like `PlanPayload` (`-` for stdin).
        payload: String,
    },
    /// Show a plan's phase/step progress tree.
    Get { milestone_id: String },
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentCommands,
}

#[derive(Subcommand, Debug)]
pub enum CommentCommands {
    Add { issue_id: String, text: String },
    List { issue_id: String },
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub command: LabelCommands,
}

#[derive(Subcommand, Debug)]
pub enum LabelCommands {
    Add { issue_id: String, label: String },
    Remove { issue_id: String, label: String },
    List { issue_id: String },
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub command: BatchCommands,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Close every listed issue in one transaction.
    Close {
        ids: Vec<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Apply the same status/priority update to every listed issue.
    Update {
        ids: Vec<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
    },
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommands,
}

#[derive(Subcommand, Debug)]
pub enum EventsCommands {
    /// Events for a single issue.
    For {
        issue_id: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Most recent events across every issue.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Events since a given event id (for polling change-feeds).
    Since {
        since_id: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Delete all but the most recent N events per issue.
    Compact {
        #[arg(long, default_value_t = 200)]
        keep_per_issue: i64,
    },
    /// Delete closed issues last touched before the given timestamp.
    ArchiveClosed { before: String },
}

#[derive(Args, Debug)]
pub struct FileArgs {
    #[command(subcommand)]
    pub command: FileCommands,
}

#[derive(Subcommand, Debug)]
pub enum FileCommands {
    /// Register (or update) a tracked project-relative file.
    Register {
        path: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long = "type")]
        file_type: Option<String>,
    },
    /// Show a single file's record.
    Show { id: String },
    /// Submit a scan's findings as a JSON file (`-` for stdin).
    Scan {
        scan_source: String,
        findings: String,
        #[arg(long)]
        scan_run_id: Option<String>,
    },
    /// Mark findings absent from two consecutive scans of a source as fixed.
    Clean { scan_source: String, scan_run_id: String },
    /// Link a file to an issue.
    Associate {
        file_id: String,
        issue_id: String,
        #[arg(long = "type", default_value = "mentioned_in")]
        assoc_type: String,
    },
    /// List tracked files with filters and pagination.
    List {
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        path_prefix: Option<String>,
        #[arg(long)]
        min_findings: Option<i64>,
        #[arg(long)]
        has_severity: Option<String>,
        #[arg(long)]
        scan_source: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Merged finding/association/metadata timeline for a file.
    Timeline {
        file_id: String,
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Files ranked by severity-weighted active-finding score.
    Hotspots {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List every known issue type.
    ListTypes,
    /// Show a type's full template (states, transitions, field schema).
    TypeInfo { type_name: String },
    /// List transitions reachable from a state for a type.
    ValidTransitions { type_name: String, state: String },
    /// Explain a state: category, required fields, reachable states.
    ExplainState { type_name: String, state: String },
    /// Human-readable summary of a type's full workflow.
    WorkflowGuide { type_name: String },
    /// List a type's declared states and their categories.
    WorkflowStates { type_name: String },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the resolved `config.json`.
    Show,
    /// Get one ambient key/value config entry.
    Get { key: String },
    /// Set one ambient key/value config entry.
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    /// Window size in days for cycle time, lead time, and throughput.
    #[arg(long, default_value_t = 30)]
    pub window_days: i64,
}

fn parse_field(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

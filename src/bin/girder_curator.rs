use std::collections::BTreeSet;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use girder_curator::client::{GirderHttpClient, ObjectStoreClient};
use girder_curator::config::{ConfigLoader, ResolvedConfig};
use girder_curator::domain::{EntityId, EntityKind, EntityRef, SortDir};
use girder_curator::error::CuratorError;
use girder_curator::housekeeping;
use girder_curator::normalize::normalize_keys;
use girder_curator::output::JsonOutput;
use girder_curator::resolver::{self, LookupOptions};
use girder_curator::schedule::{ScheduleRequest, add_to_schedule};
use girder_curator::walker::normalize_metadata_tree;

#[derive(Parser)]
#[command(name = "girder-curator")]
#[command(about = "Find-or-create, schedule and metadata housekeeping for Girder stores")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to ./girder-curator.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Profile within the config file
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Resolve an entity by name, creating it if missing")]
    Resolve(ResolveArgs),
    #[command(about = "Add an activity to a schedule")]
    Schedule(ScheduleArgs),
    #[command(about = "camelCase metadata keys below an entity (kind:id)")]
    CamelCase { entity: EntityRef },
    #[command(about = "camelCase the keys of a local JSON file")]
    Keys { path: Utf8PathBuf },
    #[command(about = "List entities of a kind under a parent (kind:id)")]
    Ls { kind: EntityKind, parent: EntityRef },
    #[command(about = "Show a folder or item without its identity fields")]
    Info { entity: EntityRef },
    #[command(about = "Move an entity under a new parent")]
    Mv { entity: EntityRef, parent: EntityRef },
    #[command(about = "Rename an entity")]
    Rename { entity: EntityRef, name: String },
    #[command(about = "Replace an item with a folder holding its files")]
    PromoteItem { item_id: String },
    #[command(about = "Look up a user id by email or login")]
    UserId { email: String },
    #[command(about = "Resolve group ids, creating missing groups")]
    Groups { names: Vec<String> },
    #[command(about = "Delete every collection except the given ids")]
    DeleteCollections(ExceptArgs),
    #[command(about = "Delete every user except the given ids")]
    DeleteUsers(ExceptArgs),
}

#[derive(Args)]
struct ResolveArgs {
    kind: EntityKind,
    name: String,
    #[arg(long)]
    parent: Option<EntityRef>,
    #[arg(long, default_value_t = 1)]
    limit: u32,
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    sortdir: SortDir,
    #[arg(long, default_value_t = 0)]
    index: usize,
}

#[derive(Args)]
struct ScheduleArgs {
    #[arg(long)]
    frequency: String,
    #[arg(long)]
    schedules_id: String,
    #[arg(long)]
    activity_item_id: String,
    /// JSON file holding the `@context` for a new schedule
    #[arg(long)]
    context: Option<Utf8PathBuf>,
    #[arg(long)]
    schedule_folder_id: Option<String>,
    #[arg(long)]
    schedule_item_id: Option<String>,
}

#[derive(Args)]
struct ExceptArgs {
    #[arg(long = "except")]
    except: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CuratorError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CuratorError) -> u8 {
    match error {
        CuratorError::MissingConfig
        | CuratorError::ConfigRead(_)
        | CuratorError::ConfigParse(_)
        | CuratorError::UnknownProfile(_)
        | CuratorError::UnknownFrequency(_)
        | CuratorError::InvalidKind(_)
        | CuratorError::InvalidEntityRef(_)
        | CuratorError::UnsupportedTraversal(_) => 2,
        CuratorError::Http(_)
        | CuratorError::Status { .. }
        | CuratorError::Decode(_)
        | CuratorError::MissingField { .. } => 3,
        CuratorError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Keys { path } = &cli.command {
        return JsonOutput::print(&normalize_file(path)?).into_diagnostic();
    }

    let config = ConfigLoader::resolve(cli.config.as_deref(), cli.profile.as_deref())?;
    let client = connect(&config)?;
    run_command(cli.command, &client, &config)
}

fn read_json(path: &Utf8PathBuf) -> Result<Value, CuratorError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| CuratorError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content).map_err(|err| CuratorError::Decode(err.to_string()))
}

fn normalize_file(path: &Utf8PathBuf) -> Result<Value, CuratorError> {
    Ok(normalize_keys(&read_json(path)?))
}

fn connect(config: &ResolvedConfig) -> Result<GirderHttpClient, CuratorError> {
    let profile = &config.profile;
    match &profile.credentials {
        Some(credentials) => {
            GirderHttpClient::connect(&profile.api_url, profile.timeout, credentials)
        }
        None => GirderHttpClient::new(&profile.api_url, profile.timeout),
    }
}

fn run_command(
    command: Command,
    client: &GirderHttpClient,
    config: &ResolvedConfig,
) -> miette::Result<()> {
    let value = match command {
        Command::Resolve(args) => {
            let options = LookupOptions {
                limit: args.limit,
                sort_dir: args.sortdir,
                index: args.index,
            };
            let entity = resolver::resolve_or_create(
                client,
                args.kind,
                &args.name,
                args.parent.as_ref(),
                &options,
            )?;
            json!(entity)
        }
        Command::Schedule(args) => {
            let context = match args.context {
                Some(path) => read_json(&path)?,
                None => config.context.clone(),
            };
            let mut request = ScheduleRequest::new(
                args.frequency,
                EntityId::new(args.schedules_id),
                EntityId::new(args.activity_item_id),
            )
            .with_context(context)
            .with_timings(config.timings.clone());
            if let Some(id) = args.schedule_folder_id {
                request = request.with_schedule_folder(EntityId::new(id));
            }
            if let Some(id) = args.schedule_item_id {
                request = request.with_schedule_item(EntityId::new(id));
            }
            let item_id = add_to_schedule(client, &request)?;
            json!({ "schedule_item_id": item_id })
        }
        Command::CamelCase { entity } => {
            let root = client.get(&entity.path())?;
            json!(normalize_metadata_tree(client, &root)?)
        }
        Command::Keys { path } => normalize_file(&path)?,
        Command::Ls { kind, parent } => json!(resolver::ls_x_in_y(kind, &parent, client)?),
        Command::Info { entity } => {
            json!(resolver::get_folder_or_item_info(&entity.id, entity.kind, client)?)
        }
        Command::Mv { entity, parent } => housekeeping::mv(&entity, &parent, client)?,
        Command::Rename { entity, name } => housekeeping::rename(&entity, &name, client)?,
        Command::PromoteItem { item_id } => {
            let folder_id = housekeeping::move_item_to_folder(&EntityId::new(item_id), client)?;
            json!({ "folder_id": folder_id })
        }
        Command::UserId { email } => json!(resolver::get_user_id_by_email(client, &email)?),
        Command::Groups { names } => {
            let groups = if names.is_empty() {
                resolver::default_groups()
            } else {
                names.into_iter().collect()
            };
            json!(resolver::get_group_ids(client, &groups)?)
        }
        Command::DeleteCollections(args) => {
            json!(housekeeping::delete_collections(client, &except_ids(args))?)
        }
        Command::DeleteUsers(args) => json!(housekeeping::delete_users(client, &except_ids(args))?),
    };
    JsonOutput::print(&value).into_diagnostic()
}

fn except_ids(args: ExceptArgs) -> BTreeSet<EntityId> {
    args.except.into_iter().map(EntityId::new).collect()
}

//! Krishi Sakhi command-line client.
//!
//! Each invocation is one "page load": it boots a client root on the durable
//! storage file, runs a single command against the session, and exits.

mod paths;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use session::{
    ApiConfig, AuthApi, ClientRoot, HttpAuthApi, LoginData, NewActivity, ProfileUpdate, RegisterData, SessionError,
    SharedStorage,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not determine home directory; pass --home or set KRISHI_SAKHI_HOME")]
    NoHomeDir,
    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),
    #[error("nothing to update; pass at least one field")]
    NothingToUpdate,
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "krishi-sakhi", about = "Krishi Sakhi farmer account client")]
struct Cli {
    /// Backend base URL (defaults to the hosted API).
    #[arg(long, env = "KRISHI_API_URL")]
    api_url: Option<String>,

    /// Directory holding the persisted session.
    #[arg(long, env = "KRISHI_SAKHI_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session.
    Status,
    Login(LoginArgs),
    Register(RegisterArgs),
    Logout,
    Profile(ProfileCommand),
    Activity(ActivityCommand),
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("identity").required(true).args(["email", "phone"])))]
struct LoginArgs {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, env = "KRISHI_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, env = "KRISHI_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    Update(ProfileUpdateArgs),
}

#[derive(Args, Debug, Default)]
struct ProfileUpdateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    land_size: Option<String>,
    #[arg(long)]
    crop: Option<String>,
    #[arg(long)]
    soil_type: Option<String>,
    #[arg(long)]
    irrigation: Option<String>,
}

impl From<ProfileUpdateArgs> for ProfileUpdate {
    fn from(args: ProfileUpdateArgs) -> Self {
        Self {
            name: args.name,
            phone: args.phone,
            location: args.location,
            land_size: args.land_size,
            crop: args.crop,
            soil_type: args.soil_type,
            irrigation: args.irrigation,
        }
    }
}

#[derive(Args, Debug)]
struct ActivityCommand {
    #[command(subcommand)]
    command: ActivitySubcommand,
}

#[derive(Subcommand, Debug)]
enum ActivitySubcommand {
    List,
    Add(ActivityAddArgs),
}

#[derive(Args, Debug)]
struct ActivityAddArgs {
    /// Activity type, e.g. Sowing, Irrigation, Fertilizer, Pest Control.
    #[arg(long = "type")]
    kind: String,
    #[arg(long)]
    date: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    quantity: String,
    #[arg(long, default_value = "")]
    notes: String,
}

impl From<ActivityAddArgs> for NewActivity {
    fn from(args: ActivityAddArgs) -> Self {
        Self {
            kind: args.kind,
            date: args.date,
            location: args.location,
            description: args.description,
            quantity: args.quantity,
            notes: args.notes,
        }
    }
}

/// Everything a command needs: the booted root plus the concrete backend
/// client for the farmer-data endpoints.
struct CliContext {
    root: ClientRoot,
    api: Arc<HttpAuthApi>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let home = paths::client_home(cli.home.as_deref()).ok_or(CliError::NoHomeDir)?;
    let mut config = ApiConfig::from_env();
    if let Some(url) = &cli.api_url {
        config.set_base_url(url);
    }
    tracing::debug!(base_url = %config.base_url, home = %home.display(), "starting client");

    let api = Arc::new(HttpAuthApi::new(config)?);
    let shared = SharedStorage::file(paths::storage_path(&home));
    let root = ClientRoot::boot(shared, Arc::clone(&api) as Arc<dyn AuthApi>).await;
    let mut ctx = CliContext { root, api };

    match cli.command {
        Command::Status => print_status(&ctx),
        Command::Login(args) => run_login(&ctx, args).await,
        Command::Register(args) => run_register(&ctx, args).await,
        Command::Logout => {
            ctx = run_logout(ctx).await;
            print_status(&ctx)
        }
        Command::Profile(profile) => run_profile(&ctx, profile).await,
        Command::Activity(activity) => run_activity(&ctx, activity).await,
    }
}

fn print_status(ctx: &CliContext) -> Result<(), CliError> {
    let state = ctx.root.session().state();
    print_json(&json!({
        "authenticated": state.is_authenticated(),
        "user": state.user(),
    }))
}

async fn run_login(ctx: &CliContext, args: LoginArgs) -> Result<(), CliError> {
    let credentials = match (args.email, args.phone) {
        (Some(email), _) => LoginData::with_email(email, args.password),
        (None, phone) => LoginData::with_phone(phone.unwrap_or_default(), args.password),
    };
    let user = ctx.root.session().login(&credentials).await?;
    print_json(&user)
}

async fn run_register(ctx: &CliContext, args: RegisterArgs) -> Result<(), CliError> {
    let data = RegisterData { name: args.name, email: args.email, phone: args.phone, password: args.password };
    let user = ctx.root.session().register(&data).await?;
    print_json(&user)
}

/// Log out and honour the resulting reload request by rebuilding the root.
async fn run_logout(ctx: CliContext) -> CliContext {
    let CliContext { mut root, api } = ctx;
    root.session().logout();
    if let Some(navigation) = root.take_navigation() {
        tracing::debug!(path = %navigation.path, "reloading client root");
        root = root.reload().await;
    }
    CliContext { root, api }
}

async fn run_profile(ctx: &CliContext, profile: ProfileCommand) -> Result<(), CliError> {
    let token = ctx.root.session().require_token()?;
    match profile.command {
        ProfileSubcommand::Show => {
            let profile = ctx.api.fetch_farmer_profile(&token).await?;
            print_json(&profile)
        }
        ProfileSubcommand::Update(args) => {
            let update = ProfileUpdate::from(args);
            if update.is_empty() {
                return Err(CliError::NothingToUpdate);
            }
            let profile = ctx.api.update_profile(&token, &update).await?;
            // Pick up a changed name/phone in the cached user.
            ctx.root.session().check().await;
            print_json(&profile)
        }
    }
}

async fn run_activity(ctx: &CliContext, activity: ActivityCommand) -> Result<(), CliError> {
    let token = ctx.root.session().require_token()?;
    match activity.command {
        ActivitySubcommand::List => {
            let activities = ctx.api.list_activities(&token).await?;
            print_json(&activities)
        }
        ActivitySubcommand::Add(args) => {
            let created = ctx.api.create_activity(&token, &NewActivity::from(args)).await?;
            print_json(&created)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

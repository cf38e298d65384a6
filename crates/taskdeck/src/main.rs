//! Taskdeck command line client.
//!
//! Every run starts from a fresh cookie jar: the session is hydrated, and if
//! nobody is signed in and `--email` was given, the CLI signs in first.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskdeck_client::resources::admin::{AdminUserStatus, AdminUserUpdate, ListAdminUsersParams};
use taskdeck_client::resources::assist::{AssistRequest, ChatMessage};
use taskdeck_client::resources::auth::{Role, SignInRequest, SignUpRequest};
use taskdeck_client::resources::tasks::{ListTasksParams, TaskCreate, TaskSortKey, TaskUpdate};
use taskdeck_client::resources::SortOrder;
use taskdeck_client::{ApiClient, ApiError, ApiResultExt, ClientConfig, SessionStore};

use output::Printer;

const PASSWORD_ENV: &str = "TASKDECK_PASSWORD";

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(version, about = "Taskdeck command line client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (overrides TASKDECK_API_BASE_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Sign in as this user when there is no session.
    /// The password is read from TASKDECK_PASSWORD or prompted for.
    #[arg(long, global = true)]
    email: Option<String>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user
    Whoami,

    /// Create an account (uses --email) and sign in
    Signup {
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// End the current session
    Signout,

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Administration (admin role required)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Show the motivation message for the current hour
    Motivation {
        /// Name to greet (defaults to the signed-in user)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Ask the task assistant
    Assist {
        /// Question or instruction
        query: String,

        #[arg(long)]
        locale: Option<String>,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks
    List {
        /// Sort key: createdAt, updatedAt, title
        #[arg(long)]
        sort: Option<TaskSortKey>,

        /// Sort order: asc, desc
        #[arg(long)]
        order: Option<SortOrder>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one task
    Get { id: String },

    /// Create a task
    Create {
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// 1 (lowest) to 5 (highest)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        priority: Option<u8>,

        /// Tag, repeatable; order is kept
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Update a task; omitted fields are left unchanged
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        priority: Option<u8>,

        /// Replace the tag list, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a task
    Delete { id: String },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Manage users
    Users {
        #[command(subcommand)]
        command: AdminUserCommands,
    },

    /// Show user statistics
    Stats,
}

#[derive(Subcommand)]
enum AdminUserCommands {
    /// List users
    List {
        /// Search email and name
        #[arg(short, long)]
        q: Option<String>,

        #[arg(long)]
        role: Option<Role>,

        /// active, inactive, banned
        #[arg(long)]
        status: Option<AdminUserStatus>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one user
    Get { id: String },

    /// Update a user
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        role: Option<Role>,

        #[arg(long)]
        status: Option<AdminUserStatus>,

        #[arg(long)]
        tz: Option<String>,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Ban a user
    Ban { id: String },

    /// Delete a user
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,taskdeck=info,taskdeck_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    if let Err(e) = result {
        output::report(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    tracing::debug!(api_base_url = %config.api_base_url, "Configuration loaded");

    let client = ApiClient::new(&config).context("Failed to create API client")?;
    let session = SessionStore::new(client);
    session.hydrate().await;

    let printer = Printer::new(cli.json);

    let signing_up = matches!(cli.command, Commands::Signup { .. });
    if !signing_up && !session.is_authenticated() {
        if let Some(email) = &cli.email {
            let credentials = SignInRequest {
                email: email.clone(),
                password: read_password()?,
                remember_me: None,
            };
            session
                .sign_in(&credentials)
                .await
                .log("signing in")
                .context("Sign in failed")?;
        }
    }

    match cli.command {
        Commands::Signup { name } => {
            let email = cli.email.context("--email is required for signup")?;
            let registration = SignUpRequest {
                email,
                password: read_password()?,
                name,
            };
            let user = session
                .sign_up(&registration)
                .await
                .log("signing up")
                .context("Sign up failed")?;
            printer.user(&user)
        }
        Commands::Whoami => match session.user() {
            Some(user) => printer.user(&user),
            None => bail!("Not signed in (pass --email to sign in)"),
        },
        Commands::Signout => {
            session.sign_out().await.log("signing out").context("Sign out failed")?;
            printer.done("Signed out")
        }
        Commands::Tasks { command } => tasks(&session, &printer, command).await,
        Commands::Admin { command } => admin(&session, &printer, command).await,
        Commands::Motivation { name, locale } => {
            let name = name.or_else(|| session.user().map(|u| u.label().to_string()));
            let motivation = session
                .client()
                .motivation()
                .now(name.as_deref(), locale.as_deref())
                .await
                .log("loading motivation")
                .context("Failed to load motivation")?;
            printer.motivation(&motivation)
        }
        Commands::Assist { query, locale } => {
            let request = AssistRequest {
                messages: vec![ChatMessage::user(query.clone())],
                query,
                locale,
            };
            let response = session
                .client()
                .assist()
                .ask(&request)
                .await
                .log("asking assistant")
                .context("Assistant request failed")?;
            printer.assist(&response)
        }
    }
}

async fn tasks(session: &SessionStore, printer: &Printer, command: TaskCommands) -> Result<()> {
    let api = session.client().tasks();
    match command {
        TaskCommands::List {
            sort,
            order,
            page,
            page_size,
        } => {
            let params = ListTasksParams {
                sort_key: sort,
                sort_order: order,
                page,
                page_size,
            };
            let tasks = api
                .list(&params)
                .await
                .log("listing tasks")
                .context("Failed to list tasks")?;
            printer.tasks(&tasks)
        }
        TaskCommands::Get { id } => {
            let task = api
                .get(&id)
                .await
                .log("loading task")
                .with_context(|| format!("Failed to load task {}", id))?;
            printer.task(&task)
        }
        TaskCommands::Create {
            title,
            description,
            priority,
            tags,
        } => {
            let payload = TaskCreate {
                title,
                description,
                priority,
                tags,
                ..TaskCreate::default()
            };
            let task = api
                .create(&payload)
                .await
                .log("creating task")
                .context("Failed to create task")?;
            printer.task(&task)
        }
        TaskCommands::Update {
            id,
            title,
            description,
            priority,
            tags,
        } => {
            let payload = TaskUpdate {
                title,
                description,
                priority,
                tags: (!tags.is_empty()).then_some(tags),
                ..TaskUpdate::default()
            };
            let task = api
                .update(&id, &payload)
                .await
                .log("updating task")
                .with_context(|| format!("Failed to update task {}", id))?;
            printer.task(&task)
        }
        TaskCommands::Delete { id } => {
            api.delete(&id)
                .await
                .log("deleting task")
                .with_context(|| format!("Failed to delete task {}", id))?;
            printer.done(&format!("Deleted task {}", id))
        }
    }
}

async fn admin(session: &SessionStore, printer: &Printer, command: AdminCommands) -> Result<()> {
    if let Some(user) = session.user() {
        if !user.is_admin() {
            tracing::warn!(user = %user.email, "Admin command issued by a non-admin user");
        }
    }

    let api = session.client().admin();
    match command {
        AdminCommands::Stats => {
            let stats = api
                .stats_overview()
                .await
                .log("loading admin stats")
                .context("Failed to load statistics")?;
            printer.stats(&stats)
        }
        AdminCommands::Users { command } => match command {
            AdminUserCommands::List {
                q,
                role,
                status,
                page,
                page_size,
            } => {
                let params = ListAdminUsersParams {
                    q,
                    role,
                    status,
                    page,
                    page_size,
                };
                let users = api
                    .list_users(&params)
                    .await
                    .log("listing users")
                    .context("Failed to list users")?;
                printer.admin_users(&users)
            }
            AdminUserCommands::Get { id } => {
                let user = api
                    .get_user(&id)
                    .await
                    .log("loading user")
                    .with_context(|| format!("Failed to load user {}", id))?;
                printer.admin_user(&user)
            }
            AdminUserCommands::Update {
                id,
                name,
                role,
                status,
                tz,
                locale,
            } => {
                let payload = AdminUserUpdate {
                    name,
                    role,
                    status,
                    tz,
                    locale,
                };
                let user = api
                    .update_user(&id, &payload)
                    .await
                    .log("updating user")
                    .with_context(|| format!("Failed to update user {}", id))?;
                printer.admin_user(&user)
            }
            AdminUserCommands::Ban { id } => {
                let user = api
                    .ban_user(&id)
                    .await
                    .log("banning user")
                    .with_context(|| format!("Failed to ban user {}", id))?;
                printer.admin_user(&user)
            }
            AdminUserCommands::Delete { id } => {
                api.delete_user(&id)
                    .await
                    .log("deleting user")
                    .with_context(|| format!("Failed to delete user {}", id))?;
                printer.done(&format!("Deleted user {}", id))
            }
        },
    }
}

fn read_password() -> Result<String> {
    if let Some(password) = std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

/// True when the error chain bottoms out in an auth failure from the API.
pub(crate) fn is_auth_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_auth_failure)
}

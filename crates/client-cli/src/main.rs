use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::*;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod chat;
mod config;
mod feed;
mod local_store;
mod session;

use api::ApiClient;
use config::Config;
use local_store::LocalStore;
use session::Session;

#[derive(Parser)]
#[command(name = "errandbuddy")]
#[command(about = "Campus errands, study buddies and rides from the terminal")]
#[command(version)]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account; a verification code is emailed
    Register {
        email: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Verify an email address with the emailed code
    Verify { email: String, code: String },
    /// Email a fresh verification code
    Resend { email: String },
    /// Log in and remember the session
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show current login status
    Whoami,
    /// Open tasks at a glance
    Overview,
    /// Errands
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Conversations
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
    /// Ride shares
    Rides {
        #[command(subcommand)]
        action: RideAction,
    },
    /// Study buddy sessions
    Study {
        #[command(subcommand)]
        action: StudyAction,
    },
    /// Your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Print realtime events until Ctrl-C
    Feed,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// All tasks, newest first
    List,
    /// Tasks you posted
    Mine,
    Show { id: i64 },
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// open, assigned or done
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    Delete { id: i64 },
    /// Take on someone else's task
    Accept { id: i64 },
    /// Mark your task as done
    Done { id: i64 },
}

#[derive(Subcommand)]
enum ChatAction {
    /// Threads with their read status
    Overview,
    /// Print a thread (task:<id> or user:<id>)
    Show { key: ConversationKey },
    Send { key: ConversationKey, content: String },
    /// Follow a thread, polling for new messages
    Watch { key: ConversationKey },
    /// Hide the current messages of a thread on this device
    Clear { key: ConversationKey },
}

#[derive(Subcommand)]
enum RideAction {
    List,
    Create {
        origin: String,
        destination: String,
        time: String,
    },
}

#[derive(Subcommand)]
enum StudyAction {
    List {
        /// Search course, teacher and description
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long)]
        campus: Option<String>,
    },
    Create {
        course: String,
        #[arg(long)]
        campus: Option<String>,
        #[arg(long, default_value = "")]
        teacher: String,
        #[arg(long, default_value = "")]
        description: String,
        /// List the session as not currently available
        #[arg(long)]
        unavailable: bool,
    },
    Edit {
        id: i64,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        campus: Option<String>,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        available: Option<bool>,
    },
    Delete { id: i64 },
    /// Start a chat with the session owner
    Connect { id: i64 },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show {
        /// Someone else's user id
        id: Option<i64>,
    },
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "errandbuddy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().unwrap_or_default();
    let api = ApiClient::new(config.server_url(cli.server));

    match cli.command {
        Commands::Register {
            email,
            password,
            username,
            first_name,
            last_name,
        } => {
            let password = password_or_prompt(password)?;
            let req = RegisterRequest {
                email: email.clone(),
                password,
                username,
                first_name,
                last_name,
            };
            let resp = api.register(&req).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            if !resp.email_sent {
                println!("\x1b[33mThe verification email could not be sent. Try 'errandbuddy resend {}'.\x1b[0m", email);
            }
            println!("Then run 'errandbuddy verify {} <code>'.", email);
        }
        Commands::Verify { email, code } => {
            let resp = api.verify_otp(&email, &code).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
        }
        Commands::Resend { email } => {
            let resp = api.resend_otp(&email).await?;
            println!("{}", resp.msg);
            if resp.email_sent == Some(false) {
                println!("\x1b[33mThe email could not be sent.\x1b[0m");
            }
        }
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let session = api.login(&email, &password).await?;
            println!("\x1b[1;32m✅ Logged in as {}\x1b[0m", session.user.username);
            config.session = Some(session);
            config.save()?;
        }
        Commands::Logout => {
            config.session = None;
            config.save()?;
            println!("\x1b[32m✅ Logged out successfully\x1b[0m");
        }
        Commands::Whoami => match &config.session {
            Some(session) => {
                println!("\x1b[32m✓ Logged in\x1b[0m as {} <{}>", session.user.username, session.user.email);
                println!("Server: {}", api.base_url());
            }
            None => {
                println!("\x1b[33m✗ Not logged in\x1b[0m");
                println!("Run '\x1b[1merrandbuddy login <email>\x1b[0m' to authenticate");
            }
        },
        Commands::Overview => {
            let overview = api.overview().await?;
            println!("{} open task(s)", overview.count);
            for task in overview.tasks {
                let by = task.username.unwrap_or_else(|| "unknown".to_string());
                println!("  #{:<4} {}  \x1b[90mby {}\x1b[0m", task.id, task.title, by);
            }
        }
        Commands::Tasks { action } => handle_tasks(&api, &config, action).await?,
        Commands::Chat { action } => {
            let session = Session::require(&config)?;
            let mut store = LocalStore::open(Config::store_path()?);
            match action {
                ChatAction::Overview => chat::overview(&api, &session, &store).await?,
                ChatAction::Show { key } => chat::show(&api, &session, &mut store, key).await?,
                ChatAction::Send { key, content } => {
                    chat::send(&api, &session, &mut store, key, &content).await?
                }
                ChatAction::Watch { key } => chat::watch(&api, &session, &mut store, key).await?,
                ChatAction::Clear { key } => chat::clear(&mut store, key)?,
            }
        }
        Commands::Rides { action } => match action {
            RideAction::List => {
                let rides = api.list_rides().await?;
                if rides.is_empty() {
                    println!("No rides posted.");
                }
                for ride in rides {
                    println!(
                        "#{:<4} {} -> {}  {}  \x1b[90m(driver {})\x1b[0m",
                        ride.id, ride.origin, ride.destination, ride.time, ride.driver_id
                    );
                }
            }
            RideAction::Create {
                origin,
                destination,
                time,
            } => {
                let session = Session::require(&config)?;
                let req = CreateRideRequest {
                    origin,
                    destination,
                    time,
                };
                let resp = api.create_ride(&session, &req).await?;
                println!("\x1b[32m✓\x1b[0m {} (#{})", resp.msg, resp.ride.id);
            }
        },
        Commands::Study { action } => handle_study(&api, &config, action).await?,
        Commands::Profile { action } => match action {
            ProfileAction::Show { id: Some(id) } => {
                let profile = api.user(id).await?;
                println!("{} (@{})", profile.display_name(), profile.username);
            }
            ProfileAction::Show { id: None } => {
                let session = Session::require(&config)?;
                print_profile(&api.me(&session).await?);
            }
            ProfileAction::Update {
                username,
                first_name,
                last_name,
                bio,
            } => {
                let mut session = Session::require(&config)?;
                let req = UpdateProfileRequest {
                    username,
                    first_name,
                    last_name,
                    bio,
                };
                let resp = api.update_me(&session, &req).await?;
                println!("\x1b[32m✓\x1b[0m {}", resp.msg);
                print_profile(&resp.user);
                session.user = resp.user;
                config.session = Some(session);
                config.save()?;
            }
        },
        Commands::Feed => {
            let session = Session::require(&config)?;
            feed::run(&api, &session).await?;
        }
        Commands::Config { action } => handle_config_command(&mut config, action)?,
    }

    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn print_profile(user: &UserProfile) {
    let profile = PublicProfile::from(user.clone());
    println!("\x1b[1m{}\x1b[0m (@{})  #{}", profile.display_name(), user.username, user.id);
    println!("Email: {}", user.email);
    if !user.bio.is_empty() {
        println!("Bio:   {}", user.bio);
    }
}

fn print_task(task: &Task) {
    let assignee = task
        .assignee_id
        .map(|id| format!(", assigned to {}", id))
        .unwrap_or_default();
    println!(
        "#{:<4} [{}] {}  \x1b[90m(owner {}{})\x1b[0m",
        task.id, task.status, task.title, task.user_id, assignee
    );
}

async fn handle_tasks(api: &ApiClient, config: &Config, action: TaskAction) -> Result<()> {
    match action {
        TaskAction::List => {
            let tasks = api.list_tasks().await?;
            if tasks.is_empty() {
                println!("No tasks yet.");
            }
            tasks.iter().for_each(print_task);
        }
        TaskAction::Mine => {
            let session = Session::require(config)?;
            let tasks = api.my_tasks(&session).await?;
            if tasks.is_empty() {
                println!("You have not posted any tasks.");
            }
            tasks.iter().for_each(print_task);
        }
        TaskAction::Show { id } => {
            let task = api.get_task(id).await?;
            print_task(&task);
            if !task.description.is_empty() {
                println!("\n{}", task.description);
            }
        }
        TaskAction::Create { title, description } => {
            let session = Session::require(config)?;
            let resp = api
                .create_task(&session, &CreateTaskRequest { title, description })
                .await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            print_task(&resp.task);
        }
        TaskAction::Edit {
            id,
            title,
            description,
            status,
        } => {
            let session = Session::require(config)?;
            let req = UpdateTaskRequest {
                title,
                description,
                status,
            };
            let resp = api.update_task(&session, id, &req).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            print_task(&resp.task);
        }
        TaskAction::Delete { id } => {
            let session = Session::require(config)?;
            println!("{}", api.delete_task(&session, id).await?.msg);
        }
        TaskAction::Accept { id } => {
            let session = Session::require(config)?;
            let resp = api.accept_task(&session, id).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            println!("Chat with the owner: errandbuddy chat show task:{}", id);
        }
        TaskAction::Done { id } => {
            let session = Session::require(config)?;
            let resp = api.mark_done(&session, id).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
        }
    }
    Ok(())
}

fn print_study(session: &StudySession) {
    let owner = session
        .owner
        .as_ref()
        .map(PublicProfile::display_name)
        .unwrap_or_else(|| format!("user {}", session.user_id));
    let available = if session.available { "available" } else { "unavailable" };
    println!(
        "#{:<4} \x1b[1m{}\x1b[0m @ {}  \x1b[90m{} - {}\x1b[0m",
        session.id, session.course, session.campus, owner, available
    );
    if !session.teacher.is_empty() {
        println!("      Teacher: {}", session.teacher);
    }
    if !session.description.is_empty() {
        println!("      {}", session.description);
    }
}

async fn handle_study(api: &ApiClient, config: &Config, action: StudyAction) -> Result<()> {
    match action {
        StudyAction::List { query, campus } => {
            let sessions = api.list_study(&StudyQuery { q: query, campus }).await?;
            if sessions.is_empty() {
                println!("No study sessions found.");
            }
            sessions.iter().for_each(print_study);
        }
        StudyAction::Create {
            course,
            campus,
            teacher,
            description,
            unavailable,
        } => {
            let session = Session::require(config)?;
            let req = CreateStudySessionRequest {
                course,
                available: !unavailable,
                campus,
                teacher,
                description,
            };
            let resp = api.create_study(&session, &req).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            print_study(&resp.session);
        }
        StudyAction::Edit {
            id,
            course,
            campus,
            teacher,
            description,
            available,
        } => {
            let session = Session::require(config)?;
            let req = UpdateStudySessionRequest {
                course,
                available,
                campus,
                teacher,
                description,
            };
            let resp = api.update_study(&session, id, &req).await?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            print_study(&resp.session);
        }
        StudyAction::Delete { id } => {
            let session = Session::require(config)?;
            println!("{}", api.delete_study(&session, id).await?.msg);
        }
        StudyAction::Connect { id } => {
            let session = Session::require(config)?;
            let resp = api.connect_study(&session, id).await?;
            let key = ConversationKey::direct(resp.owner_id);
            let mut store = LocalStore::open(Config::store_path()?);
            store.set_title_override(key, &format!("Study Buddy Session ({})", resp.session.course))?;
            println!("\x1b[32m✓\x1b[0m {}", resp.msg);
            println!(
                "Say hi to {}: errandbuddy chat send {} \"Hi!\"",
                resp.owner.display_name(),
                key
            );
        }
    }
    Ok(())
}

fn handle_config_command(config: &mut Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            match key.as_str() {
                "server" => config.remote.server = Some(value),
                _ => bail!("Unknown config key: {}. Valid keys: server", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Show => {
            println!("server: {}", config.server_url(None));
            match &config.session {
                Some(session) => println!("session: {} (****)", session.user.email),
                None => println!("session: none"),
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

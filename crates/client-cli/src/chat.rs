use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use shared::{ChatMessage, ConversationKey, ConversationSummary, PublicProfile};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::ApiClient;
use crate::local_store::LocalStore;
use crate::session::Session;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_DM_TITLE: &str = "Study Buddy Session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    New,
    Read,
}

impl ReadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New Message",
            Self::Read => "Read",
        }
    }
}

/// Text between the first `(` and the following `)`, if any.
fn course_in(title: &str) -> Option<&str> {
    let (_, rest) = title.split_once('(')?;
    let (course, _) = rest.split_once(')')?;
    let course = course.trim();
    (!course.is_empty()).then_some(course)
}

fn join_title(head: &str, name: &str) -> String {
    format!("{} - {}", head, name)
        .trim_matches(|c| c == ' ' || c == '-')
        .to_string()
}

/// Heading shown for a thread in the overview and above a thread.
pub fn title_for(
    key: ConversationKey,
    other: Option<&PublicProfile>,
    title_override: Option<&str>,
) -> String {
    let name = other.map(PublicProfile::display_name).unwrap_or_default();
    match key {
        ConversationKey::Task { task_id } => join_title(&format!("Task #{}", task_id), &name),
        ConversationKey::Direct { .. } => {
            let name = if name.is_empty() { "Chat".to_string() } else { name };
            let head = title_override
                .map(|t| course_in(t).unwrap_or(t))
                .unwrap_or(DEFAULT_DM_TITLE);
            join_title(head, &name)
        }
    }
}

pub fn status_for(last_message_at: DateTime<Utc>, last_read: Option<DateTime<Utc>>) -> ReadStatus {
    match last_read {
        Some(read) if last_message_at <= read => ReadStatus::Read,
        _ => ReadStatus::New,
    }
}

/// Messages newer than the local clear cutoff.
pub fn visible_after(messages: Vec<ChatMessage>, cleared_at: Option<DateTime<Utc>>) -> Vec<ChatMessage> {
    match cleared_at {
        Some(cutoff) => messages.into_iter().filter(|m| m.timestamp > cutoff).collect(),
        None => messages,
    }
}

fn snippet(content: &str) -> String {
    const MAX: usize = 60;
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > MAX {
        format!("{}...", line.chars().take(MAX).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Resolves sender ids to display names, fetching each profile once.
struct Names<'a> {
    api: &'a ApiClient,
    me: i64,
    cache: HashMap<i64, String>,
}

impl<'a> Names<'a> {
    fn new(api: &'a ApiClient, me: i64) -> Self {
        Self {
            api,
            me,
            cache: HashMap::new(),
        }
    }

    async fn get(&mut self, id: i64) -> String {
        if id == self.me {
            return "You".to_string();
        }
        if let Some(name) = self.cache.get(&id) {
            return name.clone();
        }
        let name = match self.api.user(id).await {
            Ok(profile) => profile.display_name(),
            Err(e) => {
                tracing::debug!("Could not look up user {}: {}", id, e);
                format!("user {}", id)
            }
        };
        self.cache.insert(id, name.clone());
        name
    }
}

async fn print_messages(names: &mut Names<'_>, messages: &[ChatMessage]) {
    for m in messages {
        let name = names.get(m.sender_id).await;
        let at = m.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!("\x1b[90m[{}]\x1b[0m \x1b[1m{}\x1b[0m: {}", at, name, m.content);
    }
}

pub async fn overview(api: &ApiClient, session: &Session, store: &LocalStore) -> Result<()> {
    let threads: Vec<ConversationSummary> = api.conversations(session).await?;
    if threads.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }

    for thread in &threads {
        let title = title_for(thread.key, thread.other.as_ref(), store.title_override(thread.key));
        let status = status_for(thread.last_message.timestamp, store.last_read(thread.key));
        let color = match status {
            ReadStatus::New => "\x1b[1;33m",
            ReadStatus::Read => "\x1b[90m",
        };
        println!("\x1b[1m{}\x1b[0m  {}{}\x1b[0m  \x1b[90m({})\x1b[0m", title, color, status.label(), thread.key);
        println!("    {}", snippet(&thread.last_message.content));
    }
    Ok(())
}

async fn thread_title(api: &ApiClient, session: &Session, store: &LocalStore, key: ConversationKey) -> String {
    let other = match key {
        ConversationKey::Direct { user_id } => api.user(user_id).await.ok(),
        ConversationKey::Task { task_id } => match api.get_task(task_id).await {
            Ok(task) => {
                let other_id = if task.user_id == session.user_id() {
                    task.assignee_id
                } else {
                    Some(task.user_id)
                };
                match other_id {
                    Some(id) => api.user(id).await.ok(),
                    None => None,
                }
            }
            Err(_) => None,
        },
    };
    title_for(key, other.as_ref(), store.title_override(key))
}

pub async fn show(api: &ApiClient, session: &Session, store: &mut LocalStore, key: ConversationKey) -> Result<()> {
    let messages = api.thread(session, key).await?;
    let messages = visible_after(messages, store.cleared_at(key));

    println!("\x1b[1;36m{}\x1b[0m", thread_title(api, session, store, key).await);
    if messages.is_empty() {
        println!("\x1b[90mNo messages.\x1b[0m");
    }
    let mut names = Names::new(api, session.user_id());
    print_messages(&mut names, &messages).await;

    store.set_last_read(key, Utc::now())?;
    Ok(())
}

pub async fn send(
    api: &ApiClient,
    session: &Session,
    store: &mut LocalStore,
    key: ConversationKey,
    content: &str,
) -> Result<()> {
    let sent = api.send(session, key, content).await?;
    store.set_last_read(key, Utc::now())?;
    println!("\x1b[32m✓\x1b[0m {} (message #{})", sent.msg, sent.message.id);
    Ok(())
}

/// Prints the thread, then polls for new messages until Ctrl-C.
pub async fn watch(api: &ApiClient, session: &Session, store: &mut LocalStore, key: ConversationKey) -> Result<()> {
    println!("\x1b[1;36m{}\x1b[0m", thread_title(api, session, store, key).await);
    println!("\x1b[90mWatching for new messages (Ctrl-C to stop)\x1b[0m");

    let mut names = Names::new(api, session.user_id());
    let mut last_seen = 0i64;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let messages = match api.thread(session, key).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        tracing::warn!("Poll failed: {}", e);
                        continue;
                    }
                };
                let fresh: Vec<ChatMessage> = visible_after(messages, store.cleared_at(key))
                    .into_iter()
                    .filter(|m| m.id > last_seen)
                    .collect();
                if let Some(newest) = fresh.iter().map(|m| m.id).max() {
                    last_seen = newest;
                    print_messages(&mut names, &fresh).await;
                    store.set_last_read(key, Utc::now())?;
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }
    Ok(())
}

pub fn clear(store: &mut LocalStore, key: ConversationKey) -> Result<()> {
    store.set_cleared(key, Utc::now())?;
    println!("Cleared {} on this device.", key);
    Ok(())
}

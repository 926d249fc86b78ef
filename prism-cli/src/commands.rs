use anyhow::{bail, Context, Result};
use std::io::Read;
use std::sync::Arc;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use prism_client::calendar::{self, Calendar};
use prism_client::domain::{
    format_date, parse_date, DiaryEntryDetail, DiaryEntrySummary, KeywordStat, MoodStat,
};
use prism_client::ticker::{KeywordTicker, TICK_INTERVAL};
use prism_client::token::is_token_expired;
use prism_client::{
    AuthBackend, DiaryBackend, DiaryWorkflow, SessionContext, StatsBackend, WorkflowError,
    WorkflowState,
};

use crate::cli::{Commands, StatsCommand};

/// Run one command against `backend`.
pub async fn run<B>(command: Commands, backend: Arc<B>, session: &SessionContext) -> Result<()>
where
    B: DiaryBackend + AuthBackend + StatsBackend + 'static,
{
    match command {
        Commands::Guest => {
            let user = prism_client::guest_login(backend.as_ref(), session).await?;
            println!("Signed in as {} (guest)", user.nickname);
        }
        Commands::Login { token } => {
            let user = prism_client::login_with_token(session, &token)?;
            println!("Signed in as {} <{}>", user.nickname, user.email);
            warn_if_stale(&token);
        }
        Commands::Logout => {
            session.logout()?;
            println!("Signed out.");
        }
        Commands::Whoami => match session.current_user() {
            Some(user) if session.is_authenticated() => {
                println!("{} <{}> id={} role={}", user.nickname, user.email, user.id, user.role);
                if let Some(token) = session.current_token() {
                    warn_if_stale(&token);
                }
            }
            _ => println!("Not signed in."),
        },
        Commands::Month { year, month } => {
            let today = local_today();
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month() as u8);

            let shared = Calendar::shared();
            calendar::load_month(&shared, backend.as_ref(), year, month).await?;

            let calendar = shared.lock().expect("calendar lock poisoned");
            if calendar.is_empty() {
                println!("No entries in {:04}-{:02}.", year, month);
            }
            for entry in calendar.entries() {
                println!("{}", format_summary(entry));
            }
        }
        Commands::Show { id } => {
            let shared = Calendar::shared();
            let detail = calendar::open_entry(&shared, backend.as_ref(), id).await?;
            println!("{}", format_detail(&detail));
        }
        Commands::Write { date, content } => {
            let date = resolve_date(date.as_deref())?;
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };

            let workflow = DiaryWorkflow::new(backend, Calendar::shared());
            let progress = spawn_progress(workflow.subscribe());
            let result = workflow.submit(date, &content).await;
            progress.abort();

            let detail = result.map_err(explain_workflow_error)?;
            println!("{}", format_detail(&detail));
        }
        Commands::Regenerate { id } => {
            let workflow = DiaryWorkflow::new(backend, Calendar::shared());
            let progress = spawn_progress(workflow.subscribe());
            let result = workflow.regenerate(id).await;
            progress.abort();

            let detail = result.map_err(explain_workflow_error)?;
            println!("{}", format_detail(&detail));
        }
        Commands::Delete { id } => {
            let workflow = DiaryWorkflow::new(backend, Calendar::shared());
            workflow.delete(id).await?;
            println!("Deleted entry {}.", id);
        }
        Commands::Stats(stats) => {
            if !session
                .current_user()
                .map(|user| user.role.is_admin())
                .unwrap_or(false)
            {
                tracing::warn!("statistics are restricted to admin accounts");
            }
            match stats {
                StatsCommand::Keywords { year, month } => {
                    let stats = backend.keyword_stats(year, month).await?;
                    print_keyword_stats(&stats);
                }
                StatsCommand::Mood { year } => {
                    let stats = backend.mood_stats(year).await?;
                    print_mood_stats(&stats);
                }
            }
        }
        Commands::ConfigPath => bail!("config-path is handled before a backend is built"),
    }
    Ok(())
}

fn stale_token_notice(token: &str, now: OffsetDateTime) -> Option<&'static str> {
    match is_token_expired(token, now) {
        Ok(true) => Some("Access token has expired. Run `prism login` or `prism guest` again."),
        _ => None,
    }
}

fn warn_if_stale(token: &str) {
    if let Some(notice) = stale_token_notice(token, OffsetDateTime::now_utc()) {
        tracing::warn!("stored access token is expired");
        eprintln!("{}", notice);
    }
}

fn local_today() -> Date {
    OffsetDateTime::now_utc()
        .to_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
        .date()
}

fn resolve_date(raw: Option<&str>) -> Result<Date> {
    match raw {
        Some(raw) => parse_date(raw)
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw)),
        None => Ok(local_today()),
    }
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read entry from stdin")?;
    Ok(content)
}

fn explain_workflow_error(err: WorkflowError) -> anyhow::Error {
    if let WorkflowError::Fetch { log_id, .. } = &err {
        let hint = format!("Run `prism show {}` to load the saved entry", log_id);
        return anyhow::Error::new(err).context(hint);
    }
    err.into()
}

/// Print the loading screen to stderr: one line per phase, and rotating
/// captions while the image is being generated.
fn spawn_progress(mut states: watch::Receiver<WorkflowState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = KeywordTicker::default();
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        let mut last: Option<WorkflowState> = None;

        loop {
            let state = states.borrow_and_update().clone();
            if last.as_ref() != Some(&state) {
                if let Some(line) = phase_line(&state) {
                    eprintln!("{}", line);
                }
                interval.reset_immediately();
                last = Some(state.clone());
            }

            match &state {
                WorkflowState::Generating { keywords, .. } => {
                    ticker.set_keywords(keywords);
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Some(caption) = ticker.next() {
                                eprintln!("  {}", caption);
                            }
                        }
                        changed = states.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                _ => {
                    if states.changed().await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn phase_line(state: &WorkflowState) -> Option<&'static str> {
    match state {
        WorkflowState::Analyzing => Some("Reading your day..."),
        WorkflowState::Generating { .. } => Some("Painting your picture..."),
        WorkflowState::Fetching { .. } => Some("Loading the result..."),
        WorkflowState::Idle | WorkflowState::Complete { .. } => None,
    }
}

fn format_summary(entry: &DiaryEntrySummary) -> String {
    format!(
        "{}  #{:<5} mood {:>3}  {}",
        format_date(entry.date),
        entry.id,
        entry
            .mood_score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "-".to_string()),
        entry.image_url.as_deref().unwrap_or("(no image)")
    )
}

fn format_detail(detail: &DiaryEntryDetail) -> String {
    let keywords = detail
        .keywords
        .iter()
        .map(|keyword| format!("#{}", keyword))
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = vec![
        format!("Entry {} on {}", detail.id, format_date(detail.date)),
        format!("Keywords: {}", keywords),
    ];
    if let Some(score) = detail.mood_score {
        lines.push(format!("Mood: {}", score));
    }
    lines.push(format!(
        "Image: {}",
        detail.image_url.as_deref().unwrap_or("(not generated)")
    ));
    lines.push(String::new());
    lines.push(detail.content.clone());
    lines.join("\n")
}

fn print_keyword_stats(stats: &[KeywordStat]) {
    if stats.is_empty() {
        println!("No keywords recorded for this period.");
    }
    for (rank, stat) in stats.iter().enumerate() {
        println!("{}. #{} ({})", rank + 1, stat.keyword, stat.count);
    }
}

fn print_mood_stats(stats: &[MoodStat]) {
    if stats.is_empty() {
        println!("No moods recorded for this period.");
    }
    for stat in stats {
        println!("{}  {:.1}", stat.period, stat.average_score);
    }
}

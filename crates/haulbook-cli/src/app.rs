//! Command dispatch and the login routing for the CLI.
//!
//! `App` plays the router: when a request ends in `AuthorizationLost` it
//! sends the user back through login once and re-runs the command.

use std::sync::Arc;

use anyhow::{bail, Result};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use haulbook_core::models::{filter_records, sort_records, RecordSortColumn, TransportRecord};
use haulbook_core::utils::{format_currency, format_date, format_miles, truncate};
use haulbook_core::{ApiClient, ApiError, Config, SessionState, SessionStatus};

use crate::prompt;

/// Width of the monthly miles bar chart
const CHART_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Login(Option<String>),
    Register { username: String, email: String },
    Logout,
    Status,
    Dashboard,
    ListRecords {
        sort: RecordSortColumn,
        ascending: bool,
        search: Option<String>,
    },
    ShowRecord(i64),
    AddRecord,
    EditRecord(i64),
    DeleteRecords(Vec<i64>),
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            [] | ["help"] | ["--help"] | ["-h"] => Ok(Command::Help),
            ["login"] => Ok(Command::Login(None)),
            ["login", username] => Ok(Command::Login(Some(username.to_string()))),
            ["register", username, email] => Ok(Command::Register {
                username: username.to_string(),
                email: email.to_string(),
            }),
            ["logout"] => Ok(Command::Logout),
            ["status"] => Ok(Command::Status),
            ["dashboard"] => Ok(Command::Dashboard),
            ["records", "list", rest @ ..] => Self::parse_list(rest),
            ["records", "show", id] => Ok(Command::ShowRecord(parse_id(id)?)),
            ["records", "add"] => Ok(Command::AddRecord),
            ["records", "edit", id] => Ok(Command::EditRecord(parse_id(id)?)),
            ["records", "delete", ids @ ..] if !ids.is_empty() => Ok(Command::DeleteRecords(
                ids.iter().map(|id| parse_id(id)).collect::<Result<_>>()?,
            )),
            _ => bail!("Unknown command: {}", args.join(" ")),
        }
    }

    fn parse_list(mut rest: &[&str]) -> Result<Self> {
        let mut sort = RecordSortColumn::Date;
        let mut ascending = false;
        let mut search = None;

        while let Some((flag, tail)) = rest.split_first() {
            match (*flag, tail) {
                ("--sort", [col, tail @ ..]) => {
                    sort = RecordSortColumn::parse(col)
                        .ok_or_else(|| anyhow::anyhow!("Unknown sort column: {}", col))?;
                    rest = tail;
                }
                ("--search", [query, tail @ ..]) => {
                    search = Some(query.to_string());
                    rest = tail;
                }
                ("--asc", tail) => {
                    ascending = true;
                    rest = tail;
                }
                ("--desc", tail) => {
                    ascending = false;
                    rest = tail;
                }
                _ => bail!("Unexpected argument: {}", flag),
            }
        }

        Ok(Command::ListRecords {
            sort,
            ascending,
            search,
        })
    }

    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Help
                | Command::Login(_)
                | Command::Register { .. }
                | Command::Logout
                | Command::Status
        )
    }
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Record id must be a number: {}", raw))
}

fn is_authorization_lost(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ApiError>()
        .map(ApiError::is_authorization_lost)
        .unwrap_or(false)
}

pub struct App {
    config: Config,
    state: Arc<SessionState>,
    client: ApiClient,
    listener: JoinHandle<()>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let service = config.session_service()?;
        let client = ApiClient::new(service.clone());
        let state = Arc::new(SessionState::new(service));
        let listener = state.spawn_signal_listener();

        Ok(Self {
            config,
            state,
            client,
            listener,
        })
    }

    pub fn shutdown(&self) {
        self.listener.abort();
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let status = self.state.initialize().await;
        debug!(%status, "Session checked");

        if !command.needs_session() {
            return self.run_session_command(command).await;
        }

        if status != SessionStatus::Authenticated {
            eprintln!("You are not logged in.");
            self.login_entry_point(None).await?;
        }

        match self.execute(&command).await {
            Err(e) if is_authorization_lost(&e) => {
                // Back to login once; a second loss is reported, not looped
                eprintln!("Your session has expired. Please log in again.");
                self.login_entry_point(None).await?;
                self.execute(&command).await
            }
            other => other,
        }
    }

    async fn run_session_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login(username) => self.login_entry_point(username).await,
            Command::Register { username, email } => self.register(&username, &email).await,
            Command::Logout => {
                self.state.logout().await?;
                println!("Logged out.");
                Ok(())
            }
            Command::Status => {
                match self.state.user() {
                    Some(user) => println!("Logged in as {} <{}>", user.username, user.email),
                    None => println!("Not logged in."),
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The unauthenticated entry point: prompt for credentials and log in
    async fn login_entry_point(&mut self, username: Option<String>) -> Result<()> {
        if !prompt::is_interactive() {
            bail!("Not logged in. Run `haulbook login` from a terminal.");
        }

        let default = username.or_else(|| self.config.last_username.clone());
        let username = prompt::username(default.as_deref())?;
        let password = prompt::password("Password")?;

        match self.state.login(&username, &password).await {
            Ok(user) => {
                println!("Logged in as {}.", user.username);
                self.remember_username(&user.username);
                Ok(())
            }
            Err(e) => bail!(e.user_message()),
        }
    }

    async fn register(&mut self, username: &str, email: &str) -> Result<()> {
        let password = prompt::password("Password")?;
        let confirm = prompt::password("Confirm password")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        match self.state.register(username, email, &password).await {
            Ok(user) => {
                println!("Account created. Logged in as {}.", user.username);
                self.remember_username(&user.username);
                Ok(())
            }
            Err(e) => bail!(e.user_message()),
        }
    }

    fn remember_username(&mut self, username: &str) {
        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    async fn execute(&self, command: &Command) -> Result<()> {
        match command {
            Command::Dashboard => self.show_dashboard().await,
            Command::ListRecords {
                sort,
                ascending,
                search,
            } => self.list_records(*sort, *ascending, search.as_deref()).await,
            Command::ShowRecord(id) => {
                let record = self.client.get_record(*id).await?;
                print_record(&record);
                Ok(())
            }
            Command::AddRecord => {
                prompt::require_interactive("Adding a record")?;
                let input = prompt::record_form(None)?;
                let record = self.client.create_record(&input).await?;
                println!("Created record {}.", record.id);
                Ok(())
            }
            Command::EditRecord(id) => {
                prompt::require_interactive("Editing a record")?;
                let existing = self.client.get_record(*id).await?;
                let input = prompt::record_form(Some(&existing.to_input()))?;
                self.client.update_record(*id, &input).await?;
                println!("Updated record {}.", id);
                Ok(())
            }
            Command::DeleteRecords(ids) => self.delete_records(ids).await,
            _ => Ok(()),
        }
    }

    async fn show_dashboard(&self) -> Result<()> {
        let dashboard = self.client.dashboard().await?;

        println!("Total miles:   {}", format_miles(dashboard.total_miles));
        println!("Total pay:     {}", format_currency(dashboard.total_pay));
        println!("Total records: {}", dashboard.record_count);
        if let Some(rate) = dashboard.pay_per_mile() {
            println!("Pay per mile:  {}", format_currency(rate));
        }

        if !dashboard.recent_records.is_empty() {
            println!("\nRecent records");
            for record in &dashboard.recent_records {
                println!(
                    "  #{:<6} {}  {:<14} {:>12}",
                    record.id,
                    format_date(&record.date),
                    truncate(&record.po_number, 14),
                    format_currency(record.pay)
                );
            }
        }

        if let Some(peak) = dashboard.busiest_month() {
            println!("\nMonthly miles");
            for month in &dashboard.monthly_data {
                let width = if peak.miles > 0.0 {
                    ((month.miles / peak.miles) * CHART_WIDTH as f64).round() as usize
                } else {
                    0
                };
                println!(
                    "  {:<8} {:<width$} {}",
                    month.month,
                    "#".repeat(width),
                    format_miles(month.miles),
                    width = CHART_WIDTH
                );
            }
        }
        Ok(())
    }

    async fn list_records(
        &self,
        sort: RecordSortColumn,
        ascending: bool,
        search: Option<&str>,
    ) -> Result<()> {
        let mut records = self.client.list_records().await?;
        sort_records(&mut records, sort, ascending);
        let shown = filter_records(&records, search.unwrap_or_default());

        if shown.is_empty() {
            println!("No records found.");
            return Ok(());
        }

        println!(
            "{:<6} {:<13} {:<12} {:<18} {:<18} {:>10} {:>12}",
            "ID", "Date", "PO", "From", "To", "Miles", "Pay"
        );
        for r in shown {
            println!(
                "{:<6} {:<13} {:<12} {:<18} {:<18} {:>10} {:>12}",
                r.id,
                format_date(&r.date.to_string()),
                truncate(&r.po_number, 12),
                truncate(&r.location_from, 18),
                truncate(&r.location_to, 18),
                format_miles(r.miles),
                format_currency(r.pay)
            );
        }
        Ok(())
    }

    async fn delete_records(&self, ids: &[i64]) -> Result<()> {
        let question = if ids.len() == 1 {
            format!("Delete record {}?", ids[0])
        } else {
            format!("Delete {} records?", ids.len())
        };
        if prompt::is_interactive() && !prompt::confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }

        let results = join_all(ids.iter().map(|id| self.client.delete_record(*id))).await;

        let mut failed = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => println!("Deleted record {}.", id),
                Err(ApiError::AuthorizationLost) => return Err(ApiError::AuthorizationLost.into()),
                Err(e) => {
                    eprintln!("Failed to delete record {}: {}", id, e);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{} of {} deletions failed", failed, ids.len());
        }
        Ok(())
    }
}

fn print_record(r: &TransportRecord) {
    println!("Record #{}", r.id);
    println!("  PO number: {}", r.po_number);
    println!("  Date:      {}", format_date(&r.date.to_string()));
    println!("  From:      {}", r.location_from);
    println!("  To:        {}", r.location_to);
    println!("  DH miles:  {}", format_miles(r.dh_miles));
    println!("  Miles:     {}", format_miles(r.miles));
    println!("  Fuel:      {}", format_currency(r.fuel));
    println!("  Food:      {}", format_currency(r.food));
    println!("  Lumper:    {}", format_currency(r.lumper));
    println!("  Pay:       {}", format_currency(r.pay));
    println!("  Net pay:   {}", format_currency(r.net_pay()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(Command::parse(&args("")).unwrap(), Command::Help);
        assert_eq!(Command::parse(&args("login")).unwrap(), Command::Login(None));
        assert_eq!(
            Command::parse(&args("login alice")).unwrap(),
            Command::Login(Some("alice".to_string()))
        );
        assert_eq!(
            Command::parse(&args("register alice a@example.com")).unwrap(),
            Command::Register {
                username: "alice".to_string(),
                email: "a@example.com".to_string()
            }
        );
        assert_eq!(Command::parse(&args("records show 12")).unwrap(), Command::ShowRecord(12));
        assert_eq!(
            Command::parse(&args("records delete 1 2 3")).unwrap(),
            Command::DeleteRecords(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_parse_list_flags() {
        assert_eq!(
            Command::parse(&args("records list --sort pay --asc --search tulsa")).unwrap(),
            Command::ListRecords {
                sort: RecordSortColumn::Pay,
                ascending: true,
                search: Some("tulsa".to_string()),
            }
        );
        assert_eq!(
            Command::parse(&args("records list")).unwrap(),
            Command::ListRecords {
                sort: RecordSortColumn::Date,
                ascending: false,
                search: None,
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args("records show twelve")).is_err());
        assert!(Command::parse(&args("records delete")).is_err());
        assert!(Command::parse(&args("records list --sort weight")).is_err());
        assert!(Command::parse(&args("records list --bogus")).is_err());
        assert!(Command::parse(&args("fly")).is_err());
    }

    #[test]
    fn test_authorization_lost_detection() {
        let lost: anyhow::Error = ApiError::AuthorizationLost.into();
        let other: anyhow::Error = ApiError::RateLimited.into();
        assert!(is_authorization_lost(&lost));
        assert!(!is_authorization_lost(&other));
        assert!(!is_authorization_lost(&anyhow::anyhow!("plain")));
    }

    #[test]
    fn test_only_data_commands_need_session() {
        assert!(Command::Dashboard.needs_session());
        assert!(Command::DeleteRecords(vec![1]).needs_session());
        assert!(!Command::Logout.needs_session());
        assert!(!Command::Status.needs_session());
    }
}

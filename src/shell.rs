//! Interactive portal shell: a stdin/stdout REPL over the session gate.
//!
//! Every command runs against the same gate the guard reads from, and the
//! current location is re-checked against the guard after each command, so
//! a login or logout moves the user to wherever their new mode lands.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::backend::{Credentials, RequestStore};
use crate::checkin::{AdvisoryTextGenerator, Mood};
use crate::directory::{DebouncedSearch, DirectorySearch};
use crate::error::{GateError, Result};
use crate::gate::{GuardDecision, Mode, Route, SessionGate};
use crate::profile::{Organization, Profile, ProfileDraft, ProfilePatch};
use crate::requests::{Request, RequestHistory, RequestKind};

/// Extra time a `search` command waits beyond the debounce delay.
const SEARCH_GRACE: Duration = Duration::from_secs(5);

pub const HELP: &str = "\
Commands:
  login <email> <password>       sign in
  register <email> <password>    create an account
  logout                         sign out
  go <path>                      navigate (/login, /onboarding, /dashboard, /requests, /profile)
  dashboard                      greeting, time with the company and latest request
  search <text>                  find your organization (3+ characters)
  pick <n>                       select search result n
  onboard <area> | <title> | <full name>
                                 complete your profile with the picked organization
  requests                       list your HR requests
  submit <kind> <details>        new request (constancia, referencia, consulta)
  profile                        show your profile
  edit <field> <value>           update name, area, title, phone, email, id_type, id_number, start_date
  checkin <mood>                 emotional check-in (feliz, neutral, estresado)
  status                         current mode and location
  help                           this text
  quit                           exit";

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Register { email: String, password: String },
    Logout,
    Go(String),
    Dashboard,
    Search(String),
    Pick(usize),
    Onboard {
        area: String,
        job_title: String,
        full_name: String,
    },
    Requests,
    Submit { kind: RequestKind, details: String },
    Profile,
    Edit(ProfilePatch),
    CheckIn(Mood),
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Errors are user-facing usage messages.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "login" | "register" => {
                let mut parts = rest.split_whitespace();
                let (Some(email), Some(password), None) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(format!("usage: {word} <email> <password>"));
                };
                let (email, password) = (email.to_string(), password.to_string());
                if word.eq_ignore_ascii_case("login") {
                    Ok(Self::Login { email, password })
                } else {
                    Ok(Self::Register { email, password })
                }
            }
            "logout" => Ok(Self::Logout),
            "go" if !rest.is_empty() => Ok(Self::Go(rest.to_string())),
            "go" => Err("usage: go <path>".into()),
            "dashboard" => Ok(Self::Dashboard),
            "search" => Ok(Self::Search(rest.to_string())),
            "pick" => rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Pick)
                .ok_or_else(|| "usage: pick <n> (1-based)".to_string()),
            "onboard" => {
                let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
                match fields.as_slice() {
                    [area, title, name] => Ok(Self::Onboard {
                        area: area.to_string(),
                        job_title: title.to_string(),
                        full_name: name.to_string(),
                    }),
                    _ => Err("usage: onboard <area> | <title> | <full name>".into()),
                }
            }
            "requests" => Ok(Self::Requests),
            "submit" => {
                let (kind, details) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let kind = kind.parse::<RequestKind>()?;
                Ok(Self::Submit {
                    kind,
                    details: details.trim().to_string(),
                })
            }
            "profile" => Ok(Self::Profile),
            "edit" => {
                let Some((field, value)) = rest.split_once(char::is_whitespace) else {
                    return Err("usage: edit <field> <value>".into());
                };
                parse_patch(field, value.trim()).map(Self::Edit)
            }
            "checkin" => rest.parse::<Mood>().map(Self::CheckIn),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "/quit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

fn parse_patch(field: &str, value: &str) -> std::result::Result<ProfilePatch, String> {
    let value = value.to_string();
    let mut patch = ProfilePatch::default();
    match field.to_lowercase().as_str() {
        "name" => patch.full_name = Some(value),
        "area" => patch.area = Some(value),
        "title" => patch.job_title = Some(value),
        "phone" | "whatsapp" => patch.whatsapp_phone = Some(value),
        "email" => patch.personal_email = Some(value),
        "id_type" => patch.id_type = Some(value),
        "id_number" => patch.id_number = Some(value),
        "avatar" => patch.avatar_url = Some(value),
        "start_date" => {
            let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| format!("start_date must be YYYY-MM-DD: {e}"))?;
            patch.start_date = Some(date);
        }
        other => return Err(format!("unknown field '{other}'")),
    }
    Ok(patch)
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

/// Shell state layered over the gate.
pub struct Shell {
    gate: Arc<SessionGate>,
    history: RequestHistory,
    search: DebouncedSearch,
    search_wait: Duration,
    coach: Arc<dyn AdvisoryTextGenerator>,
    location: Route,
    suggestions: Vec<Organization>,
    selected: Option<Organization>,
}

impl Shell {
    pub fn new(
        gate: Arc<SessionGate>,
        requests: Arc<dyn RequestStore>,
        directory: Arc<DirectorySearch>,
        debounce: Duration,
        coach: Arc<dyn AdvisoryTextGenerator>,
    ) -> Self {
        let location = Route::landing(gate.mode());
        Self {
            history: RequestHistory::new(gate.clone(), requests),
            search: DebouncedSearch::new(directory, debounce),
            search_wait: debounce + SEARCH_GRACE,
            gate,
            coach,
            location,
            suggestions: Vec::new(),
            selected: None,
        }
    }

    pub fn location(&self) -> &Route {
        &self.location
    }

    pub fn selected(&self) -> Option<&Organization> {
        self.selected.as_ref()
    }

    /// Run one command and re-check the current location against the guard.
    pub async fn execute(&mut self, command: Command) -> Result<Outcome> {
        let result = self.dispatch(command).await;
        let mut moved = self.settle();
        if let Some(note) = moved.as_mut() {
            if self.location == Route::Dashboard {
                note.push('\n');
                note.push_str(&self.dashboard().await);
            }
        }

        match result {
            Ok(Outcome::Continue(mut text)) => {
                if let Some(note) = moved {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&note);
                }
                Ok(Outcome::Continue(text))
            }
            other => other,
        }
    }

    /// Follow the guard from the current location. Returns a note when the
    /// user was moved.
    fn settle(&mut self) -> Option<String> {
        let target = self.gate.resolve(self.location.path());
        if target == self.location {
            return None;
        }
        debug!(from = %self.location, to = %target, "Guard moved location");
        self.location = target;
        Some(format!("-> {}", self.location))
    }

    async fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        let text = match command {
            Command::Login { email, password } => {
                let snapshot = self.gate.login(&Credentials::new(email, password)).await?;
                format!("signed in ({})", snapshot.mode)
            }
            Command::Register { email, password } => {
                let snapshot = self.gate.register(&Credentials::new(email, password)).await?;
                format!("account created ({})", snapshot.mode)
            }
            Command::Logout => {
                self.gate.logout().await;
                self.search.cancel();
                self.suggestions.clear();
                self.selected = None;
                "signed out".to_string()
            }
            Command::Go(path) => self.go(&path).await,
            Command::Dashboard => self.go(Route::Dashboard.path()).await,
            Command::Search(text) => self.search(&text).await,
            Command::Pick(n) => {
                let org = n
                    .checked_sub(1)
                    .and_then(|i| self.suggestions.get(i))
                    .cloned()
                    .ok_or_else(|| GateError::validation(format!("no search result #{n}")))?;
                let text = format!("selected {} ({})", org.name, org.id);
                self.selected = Some(org);
                text
            }
            Command::Onboard {
                area,
                job_title,
                full_name,
            } => {
                let draft = ProfileDraft {
                    full_name,
                    organization_id: self
                        .selected
                        .as_ref()
                        .map(|o| o.id.clone())
                        .unwrap_or_default(),
                    area,
                    job_title,
                    ..Default::default()
                };
                let snapshot = self.gate.complete_onboarding(draft).await?;
                format!("profile saved ({})", snapshot.mode)
            }
            Command::Requests => {
                let items = self.history.load().await?;
                format_requests(&items)
            }
            Command::Submit { kind, details } => {
                let request = self.history.submit(kind, &details).await?;
                format!("request {} submitted ({})", request.id, request.status)
            }
            Command::Profile => {
                let profile = self.gate.active_profile().ok_or(GateError::Unauthenticated)?;
                format_profile(&profile)
            }
            Command::Edit(patch) => {
                let profile = self.gate.update_profile(&patch).await?;
                format!("profile updated for {}", profile.display_name())
            }
            Command::CheckIn(mood) => {
                let profile = self.gate.active_profile().ok_or(GateError::Unauthenticated)?;
                self.coach.generate(mood, profile.display_name()).await
            }
            Command::Status => self.status(),
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(text))
    }

    async fn go(&mut self, path: &str) -> String {
        match self.gate.navigate(path) {
            GuardDecision::Allow => {
                self.location = Route::parse(path);
                if self.location == Route::Dashboard {
                    return self.dashboard().await;
                }
                format!("at {}", self.location)
            }
            GuardDecision::Redirect(_) => {
                let requested = Route::parse(path);
                self.location = self.gate.resolve(path);
                let mut text =
                    format!("{requested} is not available, redirected to {}", self.location);
                if self.location == Route::Dashboard {
                    text.push('\n');
                    text.push_str(&self.dashboard().await);
                }
                text
            }
        }
    }

    /// Dashboard view for the active profile.
    async fn dashboard(&self) -> String {
        let Some(profile) = self.gate.active_profile() else {
            return "no active profile".to_string();
        };
        let latest = match self.history.load().await {
            Ok(items) => describe_latest(items.first()),
            Err(e) => {
                debug!(error = %e, "Dashboard shown without request history");
                "no disponible".to_string()
            }
        };
        render_dashboard(&profile, &latest, Local::now().date_naive())
    }

    async fn search(&mut self, text: &str) -> String {
        let seq = self.search.input(text);
        let mut rx = self.search.subscribe();
        let results = tokio::time::timeout(self.search_wait, rx.wait_for(|r| r.seq >= seq))
            .await
            .ok()
            .and_then(|r| r.ok().map(|results| results.clone()));

        let Some(results) = results else {
            self.suggestions.clear();
            return "search unavailable, try again".to_string();
        };
        self.suggestions = results.organizations;
        if self.suggestions.is_empty() {
            return if text.trim().chars().count() < crate::directory::MIN_PREFIX_CHARS {
                "type at least 3 characters".to_string()
            } else {
                "no organizations found".to_string()
            };
        }
        self.suggestions
            .iter()
            .enumerate()
            .map(|(i, org)| format!("  {}. {}", i + 1, org.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn status(&self) -> String {
        let snapshot = self.gate.snapshot();
        let who = match (&snapshot.profile, &snapshot.session) {
            (Some(profile), _) => format!("{} <{}>", profile.display_name(), profile.email),
            (None, Some(session)) => session.email.clone(),
            (None, None) => "nobody".to_string(),
        };
        let mut text = format!("mode: {}\nlocation: {}\nuser: {who}", snapshot.mode, self.location);
        if snapshot.mode == Mode::NeedsOnboarding {
            let org = self
                .selected
                .as_ref()
                .map(|o| o.name.as_str())
                .unwrap_or("none");
            text.push_str(&format!("\norganization picked: {org}"));
        }
        text
    }

    /// Read commands from `input` until EOF or `quit`.
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        eprint!("[{}] > ", self.location);

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                eprint!("[{}] > ", self.location);
                continue;
            }
            match Command::parse(line) {
                Ok(command) => match self.execute(command).await {
                    Ok(Outcome::Continue(text)) => println!("{text}"),
                    Ok(Outcome::Quit) => break,
                    Err(e) => println!("error [{}]: {e}", e.kind()),
                },
                Err(usage) => println!("{usage}"),
            }
            eprint!("[{}] > ", self.location);
        }
        self.search.cancel();
        Ok(())
    }
}

fn describe_latest(latest: Option<&Request>) -> String {
    match latest {
        Some(r) => format!(
            "{} ({}) del {}",
            r.kind,
            r.status,
            r.created_at.format("%Y-%m-%d")
        ),
        None => "ninguna".to_string(),
    }
}

fn render_dashboard(profile: &Profile, latest: &str, today: NaiveDate) -> String {
    let tenure = profile
        .tenure(today)
        .map(|t| t.to_string())
        .unwrap_or_else(|| "sin fecha de ingreso".to_string());
    format!(
        "Hola, {} 👋\nTiempo en la empresa: {tenure}\nÚltima solicitud: {latest}",
        profile.first_name()
    )
}

fn format_requests(items: &[Request]) -> String {
    if items.is_empty() {
        return "no requests yet".to_string();
    }
    items
        .iter()
        .map(|r| {
            format!(
                "  {} {:<11} {:<10} {} {}",
                r.created_at.format("%Y-%m-%d"),
                r.kind.to_string(),
                r.status.to_string(),
                r.id,
                r.details.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_profile(profile: &Profile) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    format!(
        "name: {}\nemail: {}\nrole: {}\norganization: {}\narea: {}\ntitle: {}\nstart date: {}\nid: {} {}\npersonal email: {}\nwhatsapp: {}",
        profile.display_name(),
        profile.email,
        profile.role,
        profile.organization_id,
        opt(&profile.area),
        opt(&profile.job_title),
        profile
            .start_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
        opt(&profile.id_type),
        opt(&profile.id_number),
        opt(&profile.personal_email),
        opt(&profile.whatsapp_phone),
    )
}

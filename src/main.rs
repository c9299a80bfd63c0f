//! Console front end: one consultation at a time, read from stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use symptom_triage::config::{self, OracleConfig};
use symptom_triage::connectivity::ConnectivityFlag;
use symptom_triage::consultation::{
    ConsultationError, ConsultationOrchestrator, ConsultationState, SubmitOutcome, SubmitRequest,
};
use symptom_triage::escalation::{EmergencyEscalator, EscalationPayload};
use symptom_triage::language::{Language, SUPPORTED_LANGUAGES};
use symptom_triage::models::{AnalysisResult, ImageAttachment, NewProfile};
use symptom_triage::oracle::{LlmAnalysisService, LlmTrendService, OllamaClient};
use symptom_triage::store::{ProfileStore, SqliteStore};
use symptom_triage::trend_analyzer::{TrendAnalyzer, TrendOutcome, MIN_TREND_RECORDS};

const HELP: &str = "\
Describe your symptoms and press Enter. When asked a question, just answer it.
Commands:
  /photo <path>   attach a JPEG to the next submission
  /reset          start over
  /trend          summarize recent consultations of the active profile
  /profiles       list profiles
  /new <name>|<age>|<gender>|<conditions>|<contact name>|<contact number>
  /use <id>       switch active profile
  /lang <code>    answer language (en, hi, bn, ta, te, mr, es, fr, ar, zh)
  /loc <text>     location quoted in emergency messages
  /offline, /online
  /quit";

/// Prints what a phone would dial, text and speak.
struct ConsoleEscalator;

impl EmergencyEscalator for ConsoleEscalator {
    fn escalate(&self, payload: &EscalationPayload) {
        println!("\n!!! {} [{}]", payload.speech.text, payload.speech.locale);
        if payload.message.recipient_number.is_empty() {
            println!("No emergency contact on file. Call your local emergency number.");
        } else {
            println!(
                "Message to {} ({}):\n{}",
                payload.message.recipient_name,
                payload.message.recipient_number,
                payload.message.body
            );
        }
        for query in &payload.nearby_help {
            println!(
                "Search nearby: {} near {}",
                query.category.query(),
                query.location_hint.as_deref().unwrap_or("current location")
            );
        }
    }

    fn cancel(&self) {
        tracing::debug!("Speech alert stopped");
    }
}

type Analysis = LlmAnalysisService<OllamaClient>;
type Trends = LlmTrendService<OllamaClient>;

struct Console {
    store: Arc<SqliteStore>,
    orchestrator: ConsultationOrchestrator<Analysis>,
    trends: TrendAnalyzer<Trends>,
    connectivity: Arc<ConnectivityFlag>,
    pending_image: Option<ImageAttachment>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    symptom_triage::init_tracing();
    tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);

    let oracle = OracleConfig::from_env();
    let store = Arc::new(SqliteStore::open(&config::database_path())?);
    let client = OllamaClient::from_config(&oracle)?;
    let connectivity = Arc::new(ConnectivityFlag::default());

    let orchestrator = ConsultationOrchestrator::new(
        LlmAnalysisService::new(client.clone(), &oracle.model),
        store.clone(),
        store.clone(),
        Arc::new(ConsoleEscalator),
        connectivity.clone(),
    )
    .with_oracle_timeout(oracle.timeout());
    orchestrator.set_language(Language::from_locale(
        &std::env::var("LANG").unwrap_or_default(),
    ));

    let trends = TrendAnalyzer::new(LlmTrendService::new(client, &oracle.model), store.clone())
        .with_timeout(oracle.timeout());

    let mut console = Console {
        store,
        orchestrator,
        trends,
        connectivity,
        pending_image: None,
    };

    println!("{HELP}\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = console.handle(line).await {
            println!("Error: {e}");
        }
    }
    Ok(())
}

impl Console {
    async fn handle(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        let (command, arg) = match line.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/reset" => {
                self.orchestrator.reset();
                self.pending_image = None;
                println!("Starting over.");
            }
            "/trend" => self.show_trend().await?,
            "/profiles" => {
                let active = self.store.get_active()?.map(|p| p.id);
                for p in ProfileStore::list(&*self.store)? {
                    let marker = if active.as_deref() == Some(p.id.as_str()) { "*" } else { " " };
                    println!("{marker} {}  {} ({}), contact {}", p.id, p.name, p.age, p.emergency_contact_number);
                }
            }
            "/new" => {
                let fields: Vec<&str> = arg.split('|').collect();
                let &[name, age, gender, conditions, contact_name, contact_number] = fields.as_slice() else {
                    println!("Usage: /new <name>|<age>|<gender>|<conditions>|<contact name>|<contact number>");
                    return Ok(());
                };
                let input = NewProfile::from_form(name, age, gender, conditions, contact_name, contact_number)?;
                let profile = self.store.create(input)?;
                println!("Created and selected {} ({}).", profile.name, profile.id);
            }
            "/use" => {
                self.store.set_active(arg)?;
                self.orchestrator.reset();
                self.trends.clear();
                println!("Active profile: {arg}");
            }
            "/lang" => {
                let language: Language = arg.parse()?;
                self.orchestrator.set_language(language);
                println!("Answers will be in {}.", language.name());
            }
            "/loc" => {
                let hint = (!arg.is_empty()).then(|| arg.to_string());
                self.orchestrator.set_location_hint(hint);
            }
            "/offline" => self.connectivity.set_online(false),
            "/online" => self.connectivity.set_online(true),
            "/photo" => {
                let bytes = tokio::fs::read(arg).await?;
                self.pending_image = Some(ImageAttachment::jpeg(bytes)?);
                println!("Photo attached to your next message.");
            }
            c if c.starts_with('/') => {
                let codes: Vec<_> = SUPPORTED_LANGUAGES.iter().map(Language::code).collect();
                println!("Unknown command {c}. Languages: {}\n{HELP}", codes.join(", "));
            }
            _ => self.submit(line).await?,
        }
        Ok(())
    }

    async fn submit(&mut self, text: &str) -> Result<(), ConsultationError> {
        let mut request = if self.orchestrator.state() == ConsultationState::FollowUpPending {
            SubmitRequest::follow_up(text)
        } else {
            SubmitRequest::new(text)
        };
        if let Some(image) = self.pending_image.take() {
            request = request.with_image(image);
        }

        println!("Analyzing...");
        match self.orchestrator.submit(request).await? {
            SubmitOutcome::OfflineRedirect => {
                println!("You are offline. For emergencies call your local emergency number.");
                println!("Basic first aid guidance is available without a connection.");
            }
            SubmitOutcome::FollowUp { questions, .. } => {
                println!("A few questions first:");
                for q in questions {
                    println!("  - {q}");
                }
            }
            SubmitOutcome::Finalized { result, record, .. } => {
                print_result(&result);
                if record.is_some() {
                    println!("(saved to history)");
                }
            }
            SubmitOutcome::Discarded => {}
        }
        Ok(())
    }

    async fn show_trend(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(profile) = self.store.get_active()? else {
            println!("No profile selected.");
            return Ok(());
        };
        match self.trends.analyze(&profile, self.orchestrator.language()).await? {
            TrendOutcome::InsufficientHistory { available } => println!(
                "Need at least {MIN_TREND_RECORDS} consultations for a trend ({available} so far)."
            ),
            TrendOutcome::Summary(trend) => {
                println!("Trend: {}\n{}\nAdvice: {}", trend.trend, trend.summary, trend.advice);
            }
        }
        Ok(())
    }
}

fn print_result(result: &AnalysisResult) {
    println!("\n{} | {} ({}/100)", result.condition_name, result.risk_display(), result.risk_score);
    println!("{}", result.explanation);
    if !result.first_aid_steps.is_empty() {
        println!("First aid:");
        for (i, step) in result.first_aid_steps.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
    }
    if !result.what_not_to_do.is_empty() {
        println!("Do not:");
        for item in &result.what_not_to_do {
            println!("  - {item}");
        }
    }
    println!("{}\n", result.care_recommendation);
}

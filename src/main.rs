//! Service entry point: wires configuration, collaborators, and the
//! coordinator together, then feeds stdin control lines into the command
//! channel until `stop` or EOF.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::mpsc;

use flosim_service::advisor::FloodAdvisor;
use flosim_service::alert::notifier::AlertNotifier;
use flosim_service::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, ServiceConfig};
use flosim_service::coordinator::{Command, MonitorCoordinator};
use flosim_service::fanout::FanoutHub;
use flosim_service::generator::ReadingGenerator;
use flosim_service::logging::{self, Component};
use flosim_service::scenario;
use flosim_service::scoring::{ScoringPipeline, ScoringStrategy};
use flosim_service::sms::{ConsoleSender, HttpSmsSender, SmsSender};
use flosim_service::store::{MemoryStore, PostgresStore, RecipientStore};

fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = match ServiceConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {}", config_path, e);
            std::process::exit(1);
        }
    };
    config.apply_env();

    logging::init_logger(config.min_log_level(), config.log_file.as_deref());
    logging::info(
        Component::System,
        None,
        &format!(
            "flosim_service starting for {} ({})",
            config.location.city,
            if config.demo_mode { "demo mode" } else { "live mode" }
        ),
    );

    // Store: Postgres when configured, in-memory otherwise.
    let store: Arc<dyn RecipientStore> = match (&config.database_url, config.demo_mode) {
        (Some(url), false) => match PostgresStore::connect(url) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                logging::error(Component::Store, None, &format!("connect failed: {}", e));
                std::process::exit(1);
            }
        },
        _ => Arc::new(MemoryStore::new()),
    };
    seed_demo_recipients(&config, store.as_ref());

    // SMS sender: console in demo mode or when the provider is not
    // fully configured.
    let sender: Arc<dyn SmsSender> = if config.demo_mode || !config.sms_configured() {
        if !config.demo_mode {
            logging::warn(
                Component::Sms,
                None,
                "SMS provider not configured - falling back to console sender",
            );
        }
        Arc::new(ConsoleSender)
    } else {
        match HttpSmsSender::new(
            &config.sms.api_url,
            &config.sms.account_sid,
            &config.sms.auth_token,
            &config.sms.from_number,
            config.sms.timeout_secs,
        ) {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                logging::warn(
                    Component::Sms,
                    None,
                    &format!("HTTP sender init failed ({}), using console sender", e),
                );
                Arc::new(ConsoleSender)
            }
        }
    };

    // Scoring: model artifact when present and loadable, synthetic
    // weighted sum otherwise.
    let strategy = match &config.model_artifact {
        Some(path) => match ScoringPipeline::from_json_file(path) {
            Ok(pipeline) => {
                logging::info(
                    Component::Generator,
                    None,
                    &format!("loaded scoring artifact from {}", path),
                );
                ScoringStrategy::ModelBacked(pipeline)
            }
            Err(e) => {
                logging::warn(
                    Component::Generator,
                    None,
                    &format!("scoring artifact unavailable ({}), using synthetic scoring", e),
                );
                ScoringStrategy::SyntheticWeighted
            }
        },
        None => ScoringStrategy::SyntheticWeighted,
    };

    let advisor = if config.advisory.enabled && !config.advisory.api_key.is_empty() {
        match FloodAdvisor::new(
            &config.advisory.api_url,
            &config.advisory.api_key,
            config.advisory.timeout_secs,
            config.advisory.cache_ttl_secs,
            config.advisory.min_call_interval_secs,
        ) {
            Ok(advisor) => Some(advisor),
            Err(e) => {
                logging::warn(
                    Component::Advisory,
                    None,
                    &format!("advisor init failed ({}), advisory disabled", e),
                );
                None
            }
        }
    } else {
        None
    };

    let hub = Arc::new(FanoutHub::new());
    let notifier = AlertNotifier::new(store, sender, config.cooldown_minutes);
    let generator = ReadingGenerator::new(strategy);
    let mut coordinator = MonitorCoordinator::new(
        generator,
        notifier,
        hub,
        advisor,
        config.location.clone(),
        config.interval_secs,
        chrono::Utc::now(),
    );

    let (tx, rx) = mpsc::channel();
    let worker = std::thread::spawn(move || coordinator.run(rx));

    print_help();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Command::parse(line) {
            Some(command) => {
                let stopping = command == Command::Stop;
                if tx.send(command).is_err() {
                    break;
                }
                if stopping {
                    break;
                }
            }
            None => print_help(),
        }
    }

    // EOF or stop: let the in-flight tick finish, then join.
    let _ = tx.send(Command::Stop);
    drop(tx);
    if worker.join().is_err() {
        logging::error(Component::System, None, "monitoring thread panicked");
    }
}

fn seed_demo_recipients(config: &ServiceConfig, store: &dyn RecipientStore) {
    for recipient in &config.demo_recipients {
        match store.register(
            &recipient.phone,
            &recipient.name,
            &recipient.area,
            recipient.latitude,
            recipient.longitude,
            chrono::Utc::now(),
        ) {
            Ok(id) => logging::info(
                Component::Store,
                Some(&recipient.phone),
                &format!("registered demo recipient {} (id {})", recipient.name, id),
            ),
            Err(e) => logging::log_store_failure(&recipient.phone, "register", &e),
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  scenario <name>   switch scenario ({})", scenario::all_scenario_names().join(", "));
    println!("  interval <secs>   set generation interval (5-120s)");
    println!("  auto              toggle auto-transition");
    println!("  status            print monitor status");
    println!("  stop              stop monitoring and exit");
}

//! Doctor command - verify credentials and configuration.

use crate::cli::Output;
use crate::config::{Settings, FAL_API_KEY, IMGBB_API_KEY, TAVILY_API_KEY};
use console::style;
use std::path::{Path, PathBuf};
use url::{Host, Url};

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks against the config at `config_path` (the
/// default location when `None`).
pub fn run_doctor(settings: &Settings, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);
    Output::header("Conjure Doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Keys").bold());
    let key_checks: Vec<_> = [
        (settings.model.api_key_env.as_str(), "chat model"),
        (FAL_API_KEY, "image and video generation"),
        (TAVILY_API_KEY, "web search and extraction"),
        (IMGBB_API_KEY, "image hosting"),
    ]
    .into_iter()
    .map(|(name, purpose)| check_key(name, purpose, std::env::var(name).ok()))
    .collect();
    for check in &key_checks {
        check.print();
    }
    checks.extend(key_checks);

    println!();

    println!("{}", style("Endpoints").bold());
    let url_checks = vec![
        check_url("Model API", &settings.model.api_base),
        check_url("Tavily", &settings.providers.tavily_base_url),
        check_url("fal.ai", &settings.providers.fal_base_url),
        check_url("fal.ai queue", &settings.providers.fal_queue_base_url),
        check_url("ImgBB", &settings.providers.imgbb_base_url),
        check_url("YouTube", &settings.providers.youtube_base_url),
        check_url("Chat server", &settings.client.server_url),
    ];
    for check in &url_checks {
        check.print();
    }
    checks.extend(url_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_checks = vec![check_config_file(&config_path), check_limits(settings)];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the server.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Conjure is ready to use.");
    }

    Ok(())
}

/// Check one API key value.
fn check_key(name: &str, purpose: &str, value: Option<String>) -> CheckResult {
    let hint = format!("Set with: export {}='...' (needed for {})", name, purpose);
    match value {
        Some(key) if key.trim().is_empty() => CheckResult::error(name, "empty", &hint),
        Some(key) => CheckResult::ok(name, &format!("configured ({})", mask_key(&key))),
        None => CheckResult::error(name, "not set", &hint),
    }
}

/// Show only the edges of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_url(name: &str, value: &str) -> CheckResult {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "https" => CheckResult::ok(name, value),
        Ok(url) if is_loopback(&url) => CheckResult::ok(name, &format!("{} (local)", value)),
        Ok(_) => CheckResult::warning(name, value, "Not using https"),
        Err(e) => CheckResult::error(name, &format!("invalid URL: {}", e), "Fix it with: conjure config set"),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

fn check_limits(settings: &Settings) -> CheckResult {
    if settings.model.max_steps == 0 {
        return CheckResult::error(
            "Step budget",
            "model.max_steps is 0",
            "Set with: conjure config set model.max_steps 10",
        );
    }
    let poll_budget = settings.video.poll_interval_secs * u64::from(settings.video.max_poll_attempts);
    CheckResult::ok(
        "Limits",
        &format!(
            "{} steps per response, video polls up to {}s",
            settings.model.max_steps, poll_budget
        ),
    )
}

/// Check if the config file in use exists.
fn check_config_file(path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::ok("Config file", &format!("{}", path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            &format!("{} not found, using defaults", path.display()),
            "Create with: conjure config edit",
        )
    }
}

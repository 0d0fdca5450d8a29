use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_STAGEHAND_API_URL: &str = "https://api.stagehand.browserbase.com";

/// Navigation and pagination policy for primary extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPolicy {
    /// Catalogue listing URL with `{page}` standing in for the 1-based page number.
    pub books_catalogue_url: String,
    pub books_page_count: u32,
    pub books_settle: Duration,
    pub businesses_settle: Duration,
}

impl ExtractionPolicy {
    pub fn books_page_url(&self, page: u32) -> String {
        self.books_catalogue_url.replace("{page}", &page.to_string())
    }
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            books_catalogue_url: "https://books.toscrape.com/catalogue/page-{page}.html".to_string(),
            books_page_count: 3,
            books_settle: Duration::from_millis(2000),
            businesses_settle: Duration::from_millis(3000),
        }
    }
}

/// How to launch the external fallback scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSettings {
    pub program: PathBuf,
    /// Arguments placed before `--url <url> --out <path>`.
    pub args: Vec<String>,
    /// Working directory of the fallback process.
    pub project_root: PathBuf,
    /// Directory the per-type CSV outputs are written to.
    pub data_dir: PathBuf,
}

impl FallbackSettings {
    /// Defaults for a project root holding `.venv/` and `scraper/main.py`.
    pub fn for_project_root(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            program: project_root.join(".venv/bin/python"),
            args: vec!["-u".to_string(), "scraper/main.py".to_string()],
            data_dir: project_root.join("data"),
            project_root,
        }
    }

    /// Anchor relative paths to the current working directory. The child runs
    /// in `project_root`, so a relative program or output path would otherwise
    /// resolve against a different directory than the one the parent reads.
    /// A bare program name is left for `PATH` lookup.
    pub fn resolved(&self) -> std::io::Result<Self> {
        let program = if self.program.components().count() > 1 {
            std::path::absolute(&self.program)?
        } else {
            self.program.clone()
        };
        Ok(Self {
            program,
            args: self.args.clone(),
            project_root: std::path::absolute(&self.project_root)?,
            data_dir: std::path::absolute(&self.data_dir)?,
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub run_migrations: bool,

    // Remote browser session
    pub stagehand_api_url: String,
    pub browserbase_api_key: String,
    pub browserbase_project_id: String,
    pub stagehand_model: Option<String>,

    pub extraction: ExtractionPolicy,
    pub fallback: FallbackSettings,

    // Web server
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let project_root = PathBuf::from(env_or("PROJECT_ROOT", ".."));
        let mut fallback = FallbackSettings::for_project_root(&project_root);
        if let Ok(program) = std::env::var("FALLBACK_PROGRAM") {
            fallback.program = PathBuf::from(program);
        }
        if let Ok(args) = std::env::var("FALLBACK_ARGS") {
            fallback.args = args.split_whitespace().map(String::from).collect();
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            fallback.data_dir = PathBuf::from(dir);
        }
        let fallback = fallback
            .resolved()
            .context("Failed to resolve fallback paths")?;

        let defaults = ExtractionPolicy::default();
        let extraction = ExtractionPolicy {
            books_catalogue_url: env_or("BOOKS_CATALOGUE_URL", &defaults.books_catalogue_url),
            books_page_count: parse_env("BOOKS_PAGE_COUNT", defaults.books_page_count)?,
            books_settle: Duration::from_millis(parse_env(
                "BOOKS_SETTLE_MS",
                defaults.books_settle.as_millis() as u64,
            )?),
            businesses_settle: Duration::from_millis(parse_env(
                "BUSINESSES_SETTLE_MS",
                defaults.businesses_settle.as_millis() as u64,
            )?),
        };

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            run_migrations: parse_env("RUN_MIGRATIONS", true)?,
            stagehand_api_url: env_or("STAGEHAND_API_URL", DEFAULT_STAGEHAND_API_URL),
            browserbase_api_key: std::env::var("BROWSERBASE_API_KEY")
                .context("BROWSERBASE_API_KEY is required")?,
            browserbase_project_id: std::env::var("BROWSERBASE_PROJECT_ID")
                .context("BROWSERBASE_PROJECT_ID is required")?,
            stagehand_model: std::env::var("STAGEHAND_MODEL").ok(),
            extraction,
            fallback,
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: parse_env("API_PORT", 3000)?,
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{head}...({} chars)", val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  STAGEHAND_API_URL: {}", self.stagehand_api_url);
        tracing::info!("  BROWSERBASE_API_KEY: {}", preview(&self.browserbase_api_key));
        tracing::info!("  BROWSERBASE_PROJECT_ID: {}", preview(&self.browserbase_project_id));
        tracing::info!("  FALLBACK_PROGRAM: {}", self.fallback.program.display());
        tracing::info!("  DATA_DIR: {}", self.fallback.data_dir.display());
        tracing::info!("  BOOKS_PAGE_COUNT: {}", self.extraction.books_page_count);
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_page_url_substitutes_page_number() {
        let policy = ExtractionPolicy::default();
        assert_eq!(
            policy.books_page_url(2),
            "https://books.toscrape.com/catalogue/page-2.html"
        );
    }

    #[test]
    fn fallback_defaults_hang_off_project_root() {
        let settings = FallbackSettings::for_project_root("/srv/scraper");
        assert_eq!(settings.program, PathBuf::from("/srv/scraper/.venv/bin/python"));
        assert_eq!(settings.data_dir, PathBuf::from("/srv/scraper/data"));
        assert_eq!(settings.args, vec!["-u", "scraper/main.py"]);
    }

    #[test]
    fn resolved_settings_are_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let settings = FallbackSettings::for_project_root("..").resolved().unwrap();
        assert!(settings.program.is_absolute());
        assert!(settings.project_root.is_absolute());
        assert!(settings.data_dir.is_absolute());
        assert_eq!(settings.data_dir, cwd.join("../data"));
        assert_eq!(settings.program, cwd.join("../.venv/bin/python"));
    }

    #[test]
    fn bare_program_name_is_kept_for_path_lookup() {
        let settings = FallbackSettings {
            program: PathBuf::from("python3"),
            ..FallbackSettings::for_project_root("/srv/scraper")
        };
        assert_eq!(settings.resolved().unwrap().program, PathBuf::from("python3"));
    }

    #[test]
    fn default_policy_matches_fixed_constants() {
        let policy = ExtractionPolicy::default();
        assert_eq!(policy.books_page_count, 3);
        assert_eq!(policy.books_settle, Duration::from_secs(2));
        assert_eq!(policy.businesses_settle, Duration::from_secs(3));
    }
}

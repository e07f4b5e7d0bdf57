//! Gridcard CLI - Bridge interface for hosts and scripts
//!
//! Commands: cards, templates, validate, import, export
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation or import rejection

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use gridcard_core::{
    registry::{CardRegistry, ControlKind, VisibilityTier},
    settings::EngineSettings,
    state::DashboardState,
    templates::{serialize_template, LayoutTemplate, TemplateCatalog, TemplateImporter},
    validation::Validator,
    DashboardLayout, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "gridcard-cli", version = ENGINE_VERSION)]
#[command(about = "Gridcard CLI - Dashboard Card Layout Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the engine settings file
    #[arg(long, default_value = "gridcard.settings.json")]
    settings: PathBuf,

    /// Path to the persisted dashboard state
    #[arg(long, default_value = "gridcard.state.json")]
    state: PathBuf,

    /// Directory of vendor-provided templates
    #[arg(long)]
    vendor_templates: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Development,
    Beta,
    Production,
}

impl From<TierArg> for VisibilityTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Development => VisibilityTier::Development,
            TierArg::Beta => VisibilityTier::Beta,
            TierArg::Production => VisibilityTier::Production,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List card types offered at a visibility tier
    Cards {
        /// Overrides the tier from the settings file
        #[arg(short, long, value_enum)]
        tier: Option<TierArg>,
    },

    /// List templates and the recently used ones
    Templates,

    /// Validate every card of a layout
    Validate {
        /// Layout name (defaults to the current layout)
        #[arg(short, long)]
        layout: Option<String>,
    },

    /// Import template files
    Import {
        files: Vec<PathBuf>,

        /// Store accepted templates in the state file
        #[arg(long)]
        save: bool,
    },

    /// Print a layout as a template document
    Export {
        /// Layout name (defaults to the current layout)
        #[arg(short, long)]
        layout: Option<String>,

        /// Template name
        #[arg(short, long)]
        name: String,

        /// Template description
        #[arg(short, long)]
        description: String,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!(r#"{{"error": "Failed to encode output: {}"}}"#, e),
    }
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    print_json(&json!({ "error": message.to_string() }));
    ExitCode::FAILURE
}

fn pick_layout<'s>(state: &'s DashboardState, name: Option<&str>) -> Option<&'s DashboardLayout> {
    match name {
        Some(name) => state.layout(name),
        None => Some(state.current_layout()),
    }
}

fn control_kind(kind: &ControlKind) -> &'static str {
    match kind {
        ControlKind::Boolean => "boolean",
        ControlKind::Number { .. } => "number",
        ControlKind::Text => "string",
        ControlKind::MultilineText => "text",
        ControlKind::Select { .. } => "select",
    }
}

fn control_options(kind: &ControlKind) -> Option<Vec<gridcard_core::PropValue>> {
    match kind {
        ControlKind::Select { options } => Some(options.values()),
        _ => None,
    }
}

/// One report per input file, in argument order. Unreadable files are
/// reported in place and skipped by the importer.
fn import_reports(
    importer: &mut TemplateImporter<'_>,
    files: Vec<(String, std::io::Result<Vec<u8>>)>,
) -> (Vec<serde_json::Value>, Vec<LayoutTemplate>) {
    let mut read_errors = vec![];
    let mut batch = vec![];
    for (file, read) in files {
        match read {
            Ok(bytes) => {
                read_errors.push(None);
                batch.push((file, bytes));
            }
            Err(e) => read_errors.push(Some(json!({ "file": file, "accepted": false, "error": e.to_string() }))),
        }
    }

    let mut outcomes = importer.import_batch(batch).into_iter();
    let mut reports = vec![];
    let mut accepted = vec![];
    for read_error in read_errors {
        if let Some(report) = read_error {
            reports.push(report);
            continue;
        }
        let Some(outcome) = outcomes.next() else { break };
        match outcome.result {
            Ok(template) => {
                reports.push(json!({ "file": outcome.file, "accepted": true, "name": template.name }));
                accepted.push(template);
            }
            Err(e) => {
                reports.push(json!({ "file": outcome.file, "accepted": false, "error": e.to_string() }));
            }
        }
    }

    (reports, accepted)
}

fn load_catalog(
    state: &DashboardState,
    registry: &CardRegistry,
    vendor_dir: Option<&Path>,
) -> Result<TemplateCatalog, gridcard_core::TemplateError> {
    let mut catalog = state.catalog(registry);
    if let Some(dir) = vendor_dir {
        catalog.load_vendor_dir(dir)?;
    }
    Ok(catalog)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match EngineSettings::load(&cli.settings) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let mut state = match DashboardState::load(&cli.state) {
        Ok(s) => s,
        Err(e) => return fail(format!("Failed to load state: {}", e)),
    };
    let registry = CardRegistry::builtin();

    match cli.command {
        Commands::Cards { tier } => {
            let tier = tier.map(VisibilityTier::from).unwrap_or(settings.visibility_tier);
            let cards: Vec<_> = registry
                .list_available(tier)
                .iter()
                .map(|d| json!({
                    "name": d.name,
                    "title": d.title,
                    "stability": d.stability,
                    "span": d.span,
                    "height": d.height,
                    "props": d.controls.iter().map(|c| json!({
                        "key": c.key,
                        "label": c.label,
                        "kind": control_kind(&c.kind),
                        "default": c.default,
                        "options": control_options(&c.kind),
                    })).collect::<Vec<_>>(),
                }))
                .collect();

            print_json(&cards);
            ExitCode::SUCCESS
        }

        Commands::Templates => {
            let catalog = match load_catalog(&state, &registry, cli.vendor_templates.as_deref()) {
                Ok(c) => c,
                Err(e) => return fail(e),
            };
            let recent: Vec<_> = state
                .resolve_history(&catalog)
                .iter()
                .map(|t| json!({ "name": t.name, "vendor": t.vendor }))
                .collect();
            let templates: Vec<_> = catalog
                .list()
                .iter()
                .map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "vendor": t.vendor,
                    "version": t.version.to_string(),
                    "cards": t.cards.len(),
                }))
                .collect();

            print_json(&json!({ "templates": templates, "recent": recent }));
            ExitCode::SUCCESS
        }

        Commands::Validate { layout } => {
            let Some(layout) = pick_layout(&state, layout.as_deref()) else {
                return fail("Layout not found");
            };

            let report = Validator::new().sanitize_layout(layout, &registry);
            print_json(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)  // Validation failure
            }
        }

        Commands::Import { files, save } => {
            let catalog = match load_catalog(&state, &registry, cli.vendor_templates.as_deref()) {
                Ok(c) => c,
                Err(e) => return fail(e),
            };
            let mut importer = TemplateImporter::from_catalog(&registry, &catalog);

            let files = files
                .into_iter()
                .map(|path| (path.display().to_string(), fs::read(&path)))
                .collect();
            let (reports, accepted) = import_reports(&mut importer, files);

            let all_accepted = reports.len() == accepted.len();
            if save {
                for template in accepted {
                    if let Err(e) = state.save_template(template) {
                        return fail(e);
                    }
                }
                if let Err(e) = state.save(&cli.state) {
                    return fail(format!("Failed to save state: {}", e));
                }
            }

            print_json(&reports);
            if all_accepted {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)  // At least one file rejected
            }
        }

        Commands::Export { layout, name, description } => {
            let Some(layout) = pick_layout(&state, layout.as_deref()) else {
                return fail("Layout not found");
            };

            match serialize_template(layout, &name, &description) {
                Ok(bytes) => {
                    println!("{}", String::from_utf8_lossy(&bytes));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&json!({ "success": false, "error": e.to_string() }));
                    ExitCode::from(2)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn document(name: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "name": name,
            "description": "Imported from disk",
            "cards": [{"name": "Stat", "span": 3, "props": {}}],
            "version": "1.0.0",
        }))
        .unwrap()
    }

    #[test]
    fn test_import_reports_follow_argument_order() {
        let registry = CardRegistry::builtin();
        let catalog = TemplateCatalog::with_builtins(&registry);
        let mut importer = TemplateImporter::from_catalog(&registry, &catalog);

        let files = vec![
            ("a.json".to_string(), Ok(document("First"))),
            ("missing.json".to_string(), Err(io::Error::new(io::ErrorKind::NotFound, "gone"))),
            ("b.json".to_string(), Ok(b"not json".to_vec())),
            ("c.json".to_string(), Ok(document("Second"))),
        ];
        let (reports, accepted) = import_reports(&mut importer, files);

        let order: Vec<_> = reports.iter().map(|r| r["file"].as_str().unwrap()).collect();
        assert_eq!(order, ["a.json", "missing.json", "b.json", "c.json"]);
        let flags: Vec<_> = reports.iter().map(|r| r["accepted"].as_bool().unwrap()).collect();
        assert_eq!(flags, [true, false, false, true]);
        assert_eq!(accepted.len(), 2);
    }

    #[test]
    fn test_select_controls_list_options() {
        let registry = CardRegistry::builtin();
        let chart = registry.lookup_by_name("Chart").unwrap();
        let style = chart.control("style").unwrap();
        assert_eq!(control_options(&style.kind).map(|o| o.len()), Some(3));
        assert_eq!(control_options(&chart.control("duration").unwrap().kind), None);
    }
}

//! formfill - scan an identity card, review the fields, download a filled form.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formfill::fields::{self, display_label};
use formfill::{
    ClientConfig, FormService, HttpFormService, SessionDriver, SessionStatus, TemplateCatalog,
    Upload,
};

#[derive(Parser)]
#[command(name = "formfill", version, about = "Fill government forms from identity-card scans")]
struct Cli {
    /// Form service base URL (overrides config and FORMFILL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a card image, review the extracted fields and export a PDF
    Extract {
        image: PathBuf,

        /// Blank every extracted value before applying --set
        #[arg(long)]
        reset: bool,

        #[command(flatten)]
        export: ExportArgs,
    },
    /// Start from an empty record instead of a scan
    Manual {
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Print the field keys expected for a document type
    Fields { document_type: Option<String> },
    /// List the available form templates
    Templates,
}

#[derive(Args)]
struct ExportArgs {
    /// Form template to fill
    #[arg(long, conflicts_with = "default_pdf")]
    template: Option<String>,

    /// Render the generic layout instead of a form template
    #[arg(long)]
    default_pdf: bool,

    /// Set a field value, e.g. --set "Father Name=Ramesh"
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Output directory for the PDF
    #[arg(long)]
    out: Option<PathBuf>,

    /// Stop after printing the fields
    #[arg(long)]
    no_export: bool,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formfill=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    match cli.command {
        Command::Fields { document_type } => print_fields(document_type.as_deref()),
        Command::Templates => print_templates(&config.catalog()?),
        Command::Extract {
            image,
            reset,
            export,
        } => {
            let mut driver = connect(&config, export.template.as_deref())?;
            let upload = Upload::from_path(&image)
                .await
                .with_context(|| format!("Failed to read {:?}", image))?;

            let status = driver.upload(&upload).await;
            if status != SessionStatus::Ready {
                let reason = driver
                    .session()
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| status.to_string());
                bail!("Extraction failed: {}", reason);
            }
            if reset {
                driver.reset_fields()?;
            }
            review_and_export(&mut driver, &config, export).await?;
        }
        Command::Manual { export } => {
            let mut driver = connect(&config, export.template.as_deref())?;
            driver.manual_fill();
            review_and_export(&mut driver, &config, export).await?;
        }
    }

    Ok(())
}

fn connect(
    config: &ClientConfig,
    template: Option<&str>,
) -> anyhow::Result<SessionDriver<HttpFormService>> {
    let service = HttpFormService::from_config(config)?;
    info!("Using form service at {}", service.base_url());
    let mut driver = SessionDriver::new(service, config.catalog()?);
    select_initial_template(&mut driver, &config.default_template, template)?;
    Ok(driver)
}

/// `--template` wins; the configured default is only checked when it is used.
fn select_initial_template<S: FormService>(
    driver: &mut SessionDriver<S>,
    default_template: &str,
    requested: Option<&str>,
) -> anyhow::Result<()> {
    match requested {
        Some(id) => driver.select_template(id).context("Invalid --template"),
        None => driver
            .select_template(default_template)
            .context("Invalid default template in config"),
    }
}

async fn review_and_export<S: FormService>(
    driver: &mut SessionDriver<S>,
    config: &ClientConfig,
    args: ExportArgs,
) -> anyhow::Result<()> {
    for (key, value) in &args.set {
        driver.edit_field(key, value.as_str())?;
    }

    print_session(driver);

    if args.no_export {
        return Ok(());
    }

    let download = if args.default_pdf {
        driver.export_default_pdf().await?
    } else {
        driver.export_template_pdf().await?
    };
    let out_dir = args.out.unwrap_or_else(|| config.output_dir.clone());
    let path = download.save_to(&out_dir).await?;
    println!("Saved {}", path.display());
    Ok(())
}

fn print_session<S: FormService>(driver: &SessionDriver<S>) {
    let session = driver.session();
    if let Some(document_type) = session.document_type() {
        println!("Detected document: {}", document_type.to_uppercase());
    }
    let template = session.template();
    let label = driver.catalog().label(template).unwrap_or(template.as_str());
    println!("Form template: {}", label);
    println!();

    if let Some(record) = session.record() {
        for (key, value) in record.iter() {
            let value = if value.is_empty() { "-" } else { value };
            println!("  {:<16} {}", display_label(key), value);
        }
    }
    println!();
}

fn print_fields(document_type: Option<&str>) {
    let set = match document_type {
        Some(label) => fields::resolve(Some(label)),
        None => formfill::FieldSet::combined(),
    };
    if set.is_empty() {
        println!("(no fields)");
    }
    for key in set.keys() {
        println!("{}", key);
    }
}

fn print_templates(catalog: &TemplateCatalog) {
    for template in catalog.list() {
        println!("{:<26} {}", template.id, template.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Father Name=Ramesh Kumar").unwrap(),
            ("Father Name".to_string(), "Ramesh Kumar".to_string())
        );
        assert_eq!(
            parse_assignment("Address=12, MG Road=Pune").unwrap(),
            ("Address".to_string(), "12, MG Road=Pune".to_string())
        );
        assert_eq!(parse_assignment("DOB=").unwrap().1, "");
        assert!(parse_assignment("Name").is_err());
        assert!(parse_assignment(" =x").is_err());
    }

    fn offline_driver() -> SessionDriver<HttpFormService> {
        let service =
            HttpFormService::new("http://127.0.0.1:9", std::time::Duration::from_secs(1)).unwrap();
        SessionDriver::new(service, TemplateCatalog::default())
    }

    #[test]
    fn test_cli_template_overrides_stale_default() {
        let mut driver = offline_driver();
        select_initial_template(&mut driver, "retired_form", Some("pan_form")).unwrap();
        assert_eq!(driver.session().template().as_str(), "pan_form");

        let mut driver = offline_driver();
        assert!(select_initial_template(&mut driver, "retired_form", None).is_err());
        assert!(select_initial_template(&mut driver, "birth_certificate", Some("nope")).is_err());

        select_initial_template(&mut driver, "generic_kyc", None).unwrap();
        assert_eq!(driver.session().template().as_str(), "generic_kyc");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "formfill",
            "extract",
            "card.jpg",
            "--template",
            "pan_form",
            "--set",
            "Name=Asha",
        ])
        .unwrap();
        match cli.command {
            Command::Extract { image, export, .. } => {
                assert_eq!(image, PathBuf::from("card.jpg"));
                assert_eq!(export.template.as_deref(), Some("pan_form"));
                assert_eq!(export.set, vec![("Name".to_string(), "Asha".to_string())]);
            }
            _ => panic!("expected extract"),
        }

        assert!(Cli::try_parse_from(["formfill", "manual", "--template", "x", "--default-pdf"]).is_err());
    }
}

use anyhow::Result;
use cascade_classifier::cli::{self, Cli, Commands};
use cascade_classifier::config::Config;
use cascade_classifier::error::ClassifierError;
use cascade_classifier::models::EmailFields;
use cascade_classifier::registry::ProviderRegistry;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: cascade-classifier --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with level based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cascade_classifier=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cascade_classifier=info,warn,error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Classify {
            text,
            file,
            content_type,
            provider,
        } => {
            let config = Config::load(&cli.config).await?;
            config.validate()?;

            let content = match (text, file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => tokio::fs::read_to_string(path).await?,
                (None, None) => {
                    return Err(ClassifierError::ConfigError(
                        "Provide content with --text or --file".to_string(),
                    )
                    .into())
                }
            };
            let content_type = cli::parse_content_type(content_type)?;

            let provider_name = provider
                .as_deref()
                .unwrap_or(&config.cascade.default_provider)
                .to_string();
            let registry = ProviderRegistry::new(config.clone());
            let provider = registry.create(&provider_name, None)?;

            let service = cli::build_service(&cli, &config);
            let results = service
                .classify_content(provider.as_ref(), &content, content_type)
                .await;

            if results.is_empty() {
                println!("No active category groups configured.");
                return Ok(());
            }
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }

        Commands::Cascade {
            subject,
            body,
            sender,
            email_file,
        } => {
            let config = Config::load(&cli.config).await?;
            config.validate()?;

            let fields = match email_file {
                Some(path) => cli::load_email_fields(path).await?,
                None => EmailFields {
                    subject: subject.clone(),
                    body: body.clone(),
                    sender: sender.clone().unwrap_or_default(),
                    ..Default::default()
                },
            };

            let classifier = cli::build_classifier(&cli, &config);
            let outcome = classifier.run_cascade(&fields).await;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(ClassifierError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            let config = Config::example();
            config.save(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - cascade.default_provider: Provider used for the final LLM stage");
            println!("  - cascade.statistical_threshold / neural_threshold: Stage gates");
            println!("  - providers.*: Credentials, endpoints, and model paths");
            Ok(())
        }
    }
}

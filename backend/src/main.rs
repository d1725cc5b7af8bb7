//! Clickmap CLI - Map clickstream requests onto schema records
//!
//! # Main Commands
//!
//! ```bash
//! clickmap serve --schema s.avsc --mapping m.json   # Start the collector (port 8290)
//! clickmap validate --schema s.avsc --mapping m.json
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! clickmap map https://example.com/?q=x -H "Accept-Language: fr"   # Dry-run one request
//! clickmap producers                                               # Show the mapping DSL
//! clickmap example-mapping                                         # Show an example mapping
//! ```
//!
//! `--schema`, `--mapping` and `--port` fall back to `CLICKMAP_SCHEMA_FILE`,
//! `CLICKMAP_MAPPING_FILE` and `CLICKMAP_PORT`.

use clap::{Args, Parser, Subcommand};
use clickmap::{
    example_script, producers_description, validate, CollectorConfig, Envelope, MappingScript,
    Overrides, RecordMapper, RequestContext, Schema, UserAgent,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clickmap")]
#[command(about = "Map clickstream tracking requests onto schema-conformant records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MappingFiles {
    /// Record schema file (Avro-style JSON)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Mapping script file (JSON)
    #[arg(short, long)]
    mapping: Option<PathBuf>,
}

impl MappingFiles {
    fn config(self, port: Option<u16>) -> Result<CollectorConfig, clickmap::ConfigError> {
        CollectorConfig::from_env(Overrides {
            schema_file: self.schema,
            mapping_file: self.mapping,
            port,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP collector
    Serve {
        #[command(flatten)]
        files: MappingFiles,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that a mapping satisfies its schema
    Validate {
        #[command(flatten)]
        files: MappingFiles,
    },

    /// Build one record from a request described on the command line
    Map {
        #[command(flatten)]
        files: MappingFiles,

        /// Page location
        location: String,

        /// Referer URL
        #[arg(short, long)]
        referer: Option<String>,

        /// Header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Cookie as "name=value" (repeatable)
        #[arg(short, long = "cookie")]
        cookies: Vec<String>,

        /// User-Agent string
        #[arg(long)]
        user_agent: Option<String>,

        /// Event type
        #[arg(short, long)]
        event_type: Option<String>,
    },

    /// Show the mapping DSL reference
    Producers,

    /// Show an example mapping script
    ExampleMapping,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { files, port } => cmd_serve(files, port).await,

        Commands::Validate { files } => cmd_validate(files),

        Commands::Map {
            files,
            location,
            referer,
            headers,
            cookies,
            user_agent,
            event_type,
        } => {
            let mut envelope = Envelope::new(location);
            envelope.referer = referer;
            envelope.event_type = event_type;
            cmd_map(files, envelope, &headers, &cookies, user_agent)
        }

        Commands::Producers => cmd_producers(),

        Commands::ExampleMapping => cmd_example_mapping(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(files: MappingFiles, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = files.config(port)?;
    clickmap::server::start_server(&config).await?;
    Ok(())
}

fn cmd_validate(files: MappingFiles) -> Result<(), Box<dyn std::error::Error>> {
    let config = files.config(None)?;
    eprintln!("✔️  Validating: {}", config.mapping_file.display());

    let schema = Schema::load(&config.schema_file)?;
    let script = MappingScript::load(&config.mapping_file)?;

    match validate(&schema, &script) {
        Ok(()) => {
            eprintln!(
                "✅ Mapping covers all {} required fields of {}",
                schema.required_fields().count(),
                schema.name()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("\n❌ Mapping does not satisfy {}:", schema.name());
            for problem in errors.problems() {
                eprintln!("   - {}", problem);
            }
            std::process::exit(1);
        }
    }
}

fn cmd_map(
    files: MappingFiles,
    envelope: Envelope,
    headers: &[String],
    cookies: &[String],
    user_agent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = files.config(None)?;
    let mapper = RecordMapper::load(&config.schema_file, &config.mapping_file)?;

    let mut ctx = RequestContext::new(envelope).with_user_agent(user_agent, UserAgent::default());
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Header must be 'Name: value': {}", header))?;
        ctx = ctx.with_header(name.trim(), value.trim());
    }
    for cookie in cookies {
        let (name, value) = cookie
            .split_once('=')
            .ok_or_else(|| format!("Cookie must be 'name=value': {}", cookie))?;
        ctx = ctx.with_cookie(name.trim(), value.trim());
    }

    let record = mapper.build(&ctx)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_producers() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", producers_description());
    Ok(())
}

fn cmd_example_mapping() -> Result<(), Box<dyn std::error::Error>> {
    let script = example_script()?;
    println!("{}", script.to_json()?);
    Ok(())
}

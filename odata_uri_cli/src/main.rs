//! # OData URI inspector
//!
//! Usage: `odata-uri --model model.json --service-root http://host/svc <request-uri>`

use clap::Parser;
use odata_uri::logging::{self, LogEvent, LogLevel, Logger, LoggingService};
use odata_uri::{ContextUrlBuilder, EdmModel, ODataUri, ODataUriParser, ODataVersion};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "odata-uri")]
#[command(about = "Resolve an OData request URI against a JSON model document")]
struct Args {
    /// Request URI, absolute or relative to the service root
    request_uri: String,

    /// JSON model document
    #[arg(long, short)]
    model: PathBuf,

    /// Service root the request URI is resolved against
    #[arg(long, default_value = "http://localhost/service")]
    service_root: String,

    /// Omit the context URL (no-metadata mode)
    #[arg(long)]
    no_metadata: bool,

    /// Use OData 4.0 instead of 4.01
    #[arg(long)]
    v4: bool,

    /// Print the parsed URI as JSON
    #[arg(long)]
    json: bool,

    /// Case-insensitive option names and `$`-less system options
    #[arg(long)]
    relaxed: bool,
}

/// Forwards library events to the `log` facade
struct LogFacade;

impl Logger for LogFacade {
    fn log(&self, event: &LogEvent) {
        let level = match event.level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        };
        let context: Vec<String> = event
            .context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        log::log!(target: "odata_uri", level, "[{}] {} {}", event.code, event.message, context.join(" "));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = logging::init_global_logging_with_service(Arc::new(LoggingService::new(
        Arc::new(LogFacade),
        LogLevel::Debug,
    ))) {
        log::warn!("Library logging unavailable: {}", e);
    }

    let args = Args::parse();
    let model = match load_model(&args.model) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut settings = odata_uri::config::runtime::UriParserSettings::default();
    if args.relaxed {
        settings = settings
            .with_case_insensitive(true)
            .with_no_dollar_query_options(true);
    }
    let parser = ODataUriParser::new(&model, &args.service_root).with_settings(settings);

    let uri = match parser.parse(&args.request_uri) {
        Ok(uri) => uri,
        Err(e) => {
            eprintln!("FAILED [{}]: {}", e.message_key(), e);
            process::exit(1);
        }
    };

    let builder = context_builder(&args);
    match report(&uri, &builder, args.json) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_model(path: &Path) -> Result<EdmModel, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("cannot read model '{}': {}", path.display(), e))?;
    let model = EdmModel::from_json(&json)?;
    log::info!("Loaded model from {}", path.display());
    Ok(model)
}

fn context_builder(args: &Args) -> ContextUrlBuilder {
    let version = if args.v4 { ODataVersion::V4 } else { ODataVersion::V401 };
    if args.no_metadata {
        return ContextUrlBuilder::new(None, version);
    }
    let metadata = format!("{}/$metadata", args.service_root.trim_end_matches('/'));
    ContextUrlBuilder::new(Some(&metadata), version)
}

fn report(
    uri: &ODataUri,
    builder: &ContextUrlBuilder,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let context_url = uri.context_url(builder)?;
    if json {
        let value = serde_json::json!({
            "uri": uri,
            "payload_kind": uri.payload_kind(),
            "context_url": context_url,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut lines = vec![
        format!("Path:        /{}", uri.path),
        format!("Payload:     {}", uri.payload_kind()),
    ];
    for (index, segment) in uri.path.segments.iter().enumerate() {
        let target = segment
            .target_type
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "  [{}] {:<22} {:<24} {}",
            index,
            segment.kind.name(),
            segment.identifier,
            target
        ));
    }
    if let Some(apply) = &uri.apply {
        let names: Vec<&str> = apply.transformations.iter().map(|t| t.name()).collect();
        lines.push(format!("Apply:       {}", names.join(" / ")));
        lines.push(format!("  output     {}", apply.shape.projection().join(",")));
    }
    if let Some(compute) = &uri.compute {
        let aliases: Vec<&str> = compute.aliases().collect();
        lines.push(format!("Compute:     {}", aliases.join(",")));
    }
    if let Some(clause) = &uri.select_expand {
        let selected: Vec<String> = clause.selected().iter().map(|s| s.text()).collect();
        let expanded: Vec<String> = clause.expanded().iter().map(|e| e.path_text()).collect();
        lines.push(format!("Select:      {}", selected.join(",")));
        lines.push(format!("Expand:      {}", expanded.join(",")));
    }
    lines.push(format!(
        "Context URL: {}",
        context_url.as_deref().unwrap_or("(none)")
    ));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MODEL: &str = r#"{
        "types": [
            {
                "name": "NS.City",
                "kind": "entity",
                "key": ["Id"],
                "properties": [
                    { "name": "Id", "type": "Edm.Int32", "nullable": false },
                    { "name": "Name", "type": "Edm.String" }
                ],
                "navigation_properties": [
                    { "name": "Districts", "type": "Collection(NS.District)" }
                ]
            },
            {
                "name": "NS.District",
                "kind": "entity",
                "key": ["Id"],
                "properties": [
                    { "name": "Id", "type": "Edm.Int32", "nullable": false },
                    { "name": "Zip", "type": "Edm.String" }
                ]
            }
        ],
        "entity_sets": [
            {
                "name": "Cities",
                "entity_type": "NS.City",
                "navigation_bindings": [{ "path": "Districts", "target": "Districts" }]
            },
            { "name": "Districts", "entity_type": "NS.District" }
        ]
    }"#;

    fn model_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MODEL.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_model_and_report() {
        let file = model_file();
        let model = load_model(file.path()).unwrap();
        let parser = ODataUriParser::new(&model, "http://localhost/service");
        let uri = parser
            .parse("http://localhost/service/Cities?$select=Name&$expand=Districts($select=Zip)")
            .unwrap();

        let builder = ContextUrlBuilder::new(Some("http://localhost/service/$metadata"), ODataVersion::V4);
        let text = report(&uri, &builder, false).unwrap();
        assert!(text.contains("Payload:     ResourceSet"));
        assert!(text.contains("Context URL: http://localhost/service/$metadata#Cities(Name,Districts(Zip))"));

        let json = report(&uri, &builder, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["payload_kind"], "ResourceSet");
    }

    #[test]
    fn test_load_model_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_model(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_no_metadata_builder() {
        let args = Args::parse_from(["odata-uri", "--model", "m.json", "--no-metadata", "Cities"]);
        let file = model_file();
        let model = load_model(file.path()).unwrap();
        let uri = ODataUriParser::new(&model, &args.service_root)
            .parse("http://localhost/service/Cities")
            .unwrap();
        let text = report(&uri, &context_builder(&args), false).unwrap();
        assert!(text.contains("Context URL: (none)"));
    }
}

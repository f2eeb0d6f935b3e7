//! One-shot assistant with two host tools.
//!
//! Usage:
//!   OPEN_ROUTER_API=sk-... cargo run --example assistant -- "Say hi to the current user"
//!   LLM_BASE_URL=https://api.groq.com/openai/v1 LLM_API_KEY=gsk-... LLM_MODEL=llama-3.3-70b-versatile \
//!     cargo run --example assistant -- "What's the weather in San Francisco?"
//!   cargo run --example assistant -- --stream "Write a limerick about borrow checkers"

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use llm_decorate::config;
use llm_decorate::tools::{ParamSpec, ParamType};
use llm_decorate::{
    augment, chain, DecoratorConfig, HttpTransport, Options, ProviderConfig, ToolDefinition,
    ToolError, ToolHandler, ToolRegistry, ToolSpec,
};
use serde_json::{Map, Value};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that can get weather information. \
For coordinates, use San Francisco (37.7749, -122.4194) as an example.";

#[derive(Parser)]
#[command(name = "assistant", about = "Decorate a prompt with an LLM and host tools")]
struct Cli {
    /// Prompt to send
    prompt: String,

    /// System prompt
    #[arg(long, short = 's', default_value = SYSTEM_PROMPT)]
    system: String,

    /// Model to use (overrides LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Log raw request and response bodies
    #[arg(long)]
    debug: bool,

    /// Forward the prompt without tools and print the streamed body lines
    #[arg(long)]
    stream: bool,
}

struct Weather {
    client: reqwest::Client,
}

impl Weather {
    fn spec() -> ToolSpec {
        let coord = |name: &str, what: &str| ParamSpec {
            name: name.into(),
            description: format!("The {what} of the location"),
            kind: ParamType::Number,
            required: true,
        };
        ToolSpec::new(
            "getWeather",
            "A function to get the weather for a given location using latitude and longitude",
            vec![coord("lat", "latitude"), coord("lon", "longitude")],
        )
    }
}

fn coordinate(args: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::ArgumentConversion {
            param: name.into(),
            expected: "number".into(),
        })
}

#[async_trait]
impl ToolHandler for Weather {
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let lat = coordinate(args, "lat")?;
        let lon = coordinate(args, "lon")?;

        let resp = self
            .client
            .get("https://api.open-meteo.com/v1/forecast")
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("error getting weather: {e}")))?;

        if !resp.status().is_success() {
            return Err(ToolError::Execution(format!(
                "weather service returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ToolError::Execution(format!("error decoding weather response: {e}")))?;

        let current = &body["current_weather"];
        let (Some(celsius), Some(code)) = (
            current["temperature"].as_f64(),
            current["weathercode"].as_f64(),
        ) else {
            return Err(ToolError::Execution(
                "unexpected weather response format".into(),
            ));
        };

        let fahrenheit = celsius * 9.0 / 5.0 + 32.0;
        Ok(format!(
            "The weather at coordinates ({lat:.4}, {lon:.4}) is {} with temperature {fahrenheit:.1}°F",
            describe_weather(code as i64)
        ))
    }
}

fn describe_weather(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown weather condition",
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut provider = ProviderConfig::from_env();
    if let Some(model) = cli.model {
        provider = provider.with_model(model);
    }
    if provider.api_key.is_empty() {
        eprintln!("warning: no API key set (LLM_API_KEY or OPEN_ROUTER_API)");
    }
    eprintln!("endpoint: {}", provider.endpoint());
    eprintln!("model: {}", provider.model);
    eprintln!("---");

    if let Err(e) = config::set_global(provider) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    let transport = match HttpTransport::from_global() {
        Ok(t) => Arc::new(t),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let options = Options {
        diagnostics: cli.debug,
        ..Default::default()
    };

    if cli.stream {
        let forward = chain(|prompt: &str| prompt.to_string(), transport, options);
        let mut stream = forward.stream(&cli.prompt);
        while let Some(line) = stream.chunks.recv().await {
            println!("{line}");
        }
        if let Some(err) = stream.errors.recv().await {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
        return;
    }

    let mut registry = ToolRegistry::new();
    let say_hi = registry.register(
        ToolDefinition::new(
            "sayHi",
            "A function to say hi to the user, only call this function if you know their \
             real first name such as `John` it must be a real name, if you don't know it ask.",
        )
        .param("name", "The user's real first name"),
        |name: String| format!("Hello there {name}"),
    );
    let weather = registry.register_handler(
        Weather::spec(),
        Weather {
            client: reqwest::Client::new(),
        },
    );

    let assistant = augment(
        |prompt: &str| prompt.to_string(),
        transport,
        Arc::new(registry),
        DecoratorConfig::new()
            .with_system(cli.system)
            .with_options(options)
            .with_tools([weather, say_hi]),
    );

    println!("{}", assistant.call(&cli.prompt).await);
}

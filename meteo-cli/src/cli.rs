use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use meteo_core::{
    CancellationToken, Config, PageQuery, WeatherQuery,
    client::{city_client_from_config, default_transport, weather_client_from_config},
};

use crate::{render, session};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "meteo", version, about = "Weather lookups with retries and caching")]
pub struct Cli {
    /// Print debug logs to stderr (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the weather API key and service endpoints.
    Configure,

    /// Show current weather for one or more cities.
    Show {
        /// City names; several are looked up concurrently.
        #[arg(required = true)]
        cities: Vec<String>,

        /// Always go to the network, then refresh the cache.
        #[arg(long)]
        ignore_cache: bool,
    },

    /// List cities one page at a time.
    Cities {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// Do not send or remember ETag validators.
        #[arg(long)]
        no_etag: bool,
    },

    /// Find cities whose name contains QUERY.
    Search { query: String },

    /// Show a single city by id.
    City { id: String },

    /// Interactive session; caches live for the whole session.
    Session,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                cities,
                ignore_cache,
            } => show(&Config::load()?, &cities, ignore_cache).await,
            Command::Cities {
                page,
                limit,
                no_etag,
            } => {
                let config = Config::load()?;
                let client = city_client_from_config(&config, default_transport());
                let result = cancel_on_ctrl_c(|cancel| {
                    client.get_cities_paginated(PageQuery {
                        page,
                        limit,
                        cancel: Some(cancel),
                        use_etag: !no_etag,
                    })
                })
                .await
                .map_err(|e| anyhow!(render::failure(&e)))?;

                print!("{}", render::page(&result));
                Ok(())
            }
            Command::Search { query } => {
                let config = Config::load()?;
                let client = city_client_from_config(&config, default_transport());
                let found = cancel_on_ctrl_c(|cancel| client.search_cities(&query, Some(cancel)))
                    .await
                    .map_err(|e| anyhow!(render::failure(&e)))?;

                if found.is_empty() {
                    println!("No cities match '{query}'.");
                }
                for city in &found {
                    println!("{}", render::city(city));
                }
                Ok(())
            }
            Command::City { id } => {
                let config = Config::load()?;
                let client = city_client_from_config(&config, default_transport());
                let city = cancel_on_ctrl_c(|cancel| client.get_city_by_id(&id, Some(cancel)))
                    .await
                    .map_err(|e| anyhow!(render::failure(&e)))?;

                println!("{}", render::city(&city));
                Ok(())
            }
            Command::Session => session::run(&Config::load()?).await,
        }
    }
}

async fn show(config: &Config, cities: &[String], ignore_cache: bool) -> Result<()> {
    let client = weather_client_from_config(config, default_transport())?;

    if let [city] = cities {
        let result = cancel_on_ctrl_c(|cancel| {
            client.get_weather_by_city(
                city,
                WeatherQuery {
                    ignore_cache,
                    cancel: Some(cancel),
                },
            )
        })
        .await
        .map_err(|e| anyhow!(render::failure(&e)))?;

        print!("{}", render::weather(&result));
        return Ok(());
    }

    let outcomes = cancel_on_ctrl_c(|cancel| {
        client.get_weather_for_cities(
            cities,
            WeatherQuery {
                ignore_cache,
                cancel: Some(cancel),
            },
        )
    })
    .await;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    for outcome in &outcomes {
        println!("{}", render::outcome(outcome));
    }

    if failed == outcomes.len() {
        return Err(anyhow!("All {failed} lookups failed."));
    }
    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let key_prompt = if config.has_api_key() {
        "OpenWeather API key (leave empty to keep the current one):"
    } else {
        "OpenWeather API key:"
    };
    let api_key = Password::new(key_prompt).without_confirmation().prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    config.weather_base_url = Text::new("Weather API base URL:")
        .with_default(&config.weather_base_url)
        .prompt()?;
    config.cities_base_url = Text::new("City service base URL:")
        .with_default(&config.cities_base_url)
        .prompt()?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

/// Run one request with a token that Ctrl-C cancels.
pub(crate) async fn cancel_on_ctrl_c<F, Fut, T>(request: F) -> T
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T>,
{
    let token = CancellationToken::new();

    let trigger = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling request");
            trigger.cancel();
        }
    });

    let out = request(token).await;
    watcher.abort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_accepts_several_cities() {
        let cli = Cli::try_parse_from(["meteo", "show", "Moscow", "Kazan", "--ignore-cache"])
            .expect("valid arguments");

        match cli.command {
            Command::Show {
                cities,
                ignore_cache,
            } => {
                assert_eq!(cities, ["Moscow", "Kazan"]);
                assert!(ignore_cache);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn show_requires_a_city() {
        assert!(Cli::try_parse_from(["meteo", "show"]).is_err());
    }

    #[test]
    fn cities_defaults_to_first_page_of_ten() {
        let cli = Cli::try_parse_from(["meteo", "cities"]).expect("valid arguments");

        match cli.command {
            Command::Cities {
                page,
                limit,
                no_etag,
            } => {
                assert_eq!((page, limit), (1, 10));
                assert!(!no_etag);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["meteo", "city", "7", "-v"]).expect("valid arguments");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::City { ref id } if id == "7"));
    }

    #[tokio::test]
    async fn cancel_on_ctrl_c_passes_a_live_token() {
        let cancelled = cancel_on_ctrl_c(|token| async move { token.is_cancelled() }).await;
        assert!(!cancelled);
    }
}

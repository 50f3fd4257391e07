//! Interactive loop. One set of clients (and therefore caches) serves every
//! action, so repeated lookups show cache and ETag behavior.

use std::fmt;

use anyhow::Result;
use inquire::{InquireError, Select, Text};
use meteo_core::{
    CityClient, Config, PageQuery, WeatherClient, WeatherQuery,
    client::{city_client_from_config, default_transport, weather_client_from_config},
};

use crate::{cli::cancel_on_ctrl_c, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Weather,
    Refresh,
    Compare,
    CacheInfo,
    NextPage,
    PreviousPage,
    ReloadPage,
    ClearCaches,
    Quit,
}

impl Action {
    const ALL: [Action; 9] = [
        Action::Weather,
        Action::Refresh,
        Action::Compare,
        Action::CacheInfo,
        Action::NextPage,
        Action::PreviousPage,
        Action::ReloadPage,
        Action::ClearCaches,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Weather => "Weather for a city",
            Action::Refresh => "Weather for a city, bypassing the cache",
            Action::Compare => "Compare several cities",
            Action::CacheInfo => "Cache status for a city",
            Action::NextPage => "Cities: next page",
            Action::PreviousPage => "Cities: previous page",
            Action::ReloadPage => "Cities: reload current page",
            Action::ClearCaches => "Clear caches",
            Action::Quit => "Quit",
        };
        f.write_str(label)
    }
}

struct Session {
    weather: Option<WeatherClient>,
    cities: CityClient,
    page: u32,
}

pub async fn run(config: &Config) -> Result<()> {
    let http = default_transport();
    let weather = match weather_client_from_config(config, http.clone()) {
        Ok(client) => Some(client),
        Err(err) => {
            eprintln!("{err}\nWeather lookups are disabled for this session.\n");
            None
        }
    };

    let mut session = Session {
        weather,
        cities: city_client_from_config(config, http),
        page: 0,
    };

    loop {
        let choice = Select::new("What next?", Action::ALL.to_vec()).prompt_skippable();
        let Some(action) = answer(choice)? else {
            break;
        };

        match action {
            Action::Quit => break,
            Action::Weather => session.weather(false).await?,
            Action::Refresh => session.weather(true).await?,
            Action::Compare => session.compare().await?,
            Action::CacheInfo => session.cache_info()?,
            Action::NextPage => session.show_page(session.page + 1).await,
            Action::PreviousPage => session.show_page(session.page.saturating_sub(1).max(1)).await,
            Action::ReloadPage => session.show_page(session.page.max(1)).await,
            Action::ClearCaches => session.clear_caches(),
        }
        println!();
    }

    Ok(())
}

/// Esc and Ctrl-C at a prompt both mean "no answer"; only real terminal
/// errors end the session with an error.
fn answer<T>(result: Result<Option<T>, InquireError>) -> Result<Option<T>> {
    match result {
        Err(InquireError::OperationInterrupted) => Ok(None),
        other => Ok(other?),
    }
}

impl Session {
    fn weather_client(&self) -> Option<&WeatherClient> {
        if self.weather.is_none() {
            println!("No API key configured. Run `meteo configure` first.");
        }
        self.weather.as_ref()
    }

    async fn weather(&self, ignore_cache: bool) -> Result<()> {
        let Some(client) = self.weather_client() else {
            return Ok(());
        };
        let Some(city) = answer(Text::new("City:").prompt_skippable())? else {
            return Ok(());
        };
        let city = city.trim();
        if city.is_empty() {
            return Ok(());
        }

        let result = cancel_on_ctrl_c(|cancel| {
            client.get_weather_by_city(
                city,
                WeatherQuery {
                    ignore_cache,
                    cancel: Some(cancel),
                },
            )
        })
        .await;

        match result {
            Ok(result) => print!("{}", render::weather(&result)),
            Err(err) => println!("{}", render::failure(&err)),
        }
        Ok(())
    }

    async fn compare(&self) -> Result<()> {
        let Some(client) = self.weather_client() else {
            return Ok(());
        };
        let input = answer(Text::new("Cities (comma separated):").prompt_skippable())?;
        let Some(input) = input else {
            return Ok(());
        };
        let cities: Vec<&str> = input
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        let outcomes = cancel_on_ctrl_c(|cancel| {
            client.get_weather_for_cities(
                &cities,
                WeatherQuery {
                    ignore_cache: false,
                    cancel: Some(cancel),
                },
            )
        })
        .await;

        for outcome in &outcomes {
            println!("{}", render::outcome(outcome));
        }
        Ok(())
    }

    fn cache_info(&self) -> Result<()> {
        let Some(client) = self.weather_client() else {
            return Ok(());
        };
        if let Some(city) = answer(Text::new("City:").prompt_skippable())? {
            let city = city.trim();
            println!("{}", render::cache_info(city, client.cache_info(city)));
        }
        println!("{} page validator(s) stored", self.cities.etag_cache().len());
        Ok(())
    }

    async fn show_page(&mut self, page: u32) {
        let result = cancel_on_ctrl_c(|cancel| {
            self.cities.get_cities_paginated(PageQuery {
                page,
                cancel: Some(cancel),
                ..PageQuery::default()
            })
        })
        .await;

        match result {
            Ok(result) => {
                self.page = page;
                print!("{}", render::page(&result));
            }
            Err(err) => println!("{}", render::failure(&err)),
        }
    }

    fn clear_caches(&self) {
        if let Some(client) = &self.weather {
            client.clear_cache();
        }
        self.cities.clear_cache();
        println!("Caches cleared.");
    }
}

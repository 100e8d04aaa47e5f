use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::forecast::{OpenMeteoClient, OpenWeatherClient};
use crate::location::{LocationResolver, OpenWeatherGeocoder};
use crate::store::Store;
use crate::theme::ThemeRules;
use crate::timezone::{TimeApiLookup, TimezoneLookup};

pub struct AppState {
    pub resolver: LocationResolver,
    pub current: OpenWeatherClient,
    pub forecast: OpenMeteoClient,
    pub timezone: Arc<dyn TimezoneLookup>,
    pub theme: ThemeRules,
    pub store: Store,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(settings: &Settings, store: Store) -> Self {
        let upstream = &settings.upstream;
        let timeout = upstream.timeout();

        let geocoder = OpenWeatherGeocoder::new(
            &upstream.openweather_base_url,
            &upstream.openweather_api_key,
            timeout,
        );
        let resolver = LocationResolver::new(Arc::new(geocoder))
            .with_policy(settings.resolver.policy)
            .with_limit(settings.resolver.limit);

        Self {
            resolver,
            current: OpenWeatherClient::new(
                &upstream.openweather_base_url,
                &upstream.openweather_api_key,
                timeout,
            ),
            forecast: OpenMeteoClient::new(&upstream.open_meteo_base_url, timeout),
            timezone: Arc::new(TimeApiLookup::new(&upstream.timezone_base_url, timeout)),
            theme: settings.theme,
            auth: AuthService::new(store.clone(), &settings.auth.jwt_secret, settings.auth.token_ttl_secs),
            store,
        }
    }
}

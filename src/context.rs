use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: i64,
    pub name: String,
    /// Packed ARGB accent color.
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub postal_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub home_city_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UserState {
    #[default]
    Absent,
    Present(UserProfile),
}

impl UserState {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Read-only display snapshot derived from the committed city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityProjection {
    pub id: i64,
    pub name: String,
    pub color: u32,
}

/// Single source of truth for "current city" and "current user". Both
/// cells replay their latest committed value to late subscribers and
/// deliver updates in publication order.
#[derive(Clone)]
pub struct ContextBroadcaster {
    city_tx: Arc<watch::Sender<Option<City>>>,
    user_tx: Arc<watch::Sender<UserState>>,
}

impl ContextBroadcaster {
    pub fn new() -> Self {
        let (city_tx, _) = watch::channel(None);
        let (user_tx, _) = watch::channel(UserState::Absent);
        Self {
            city_tx: Arc::new(city_tx),
            user_tx: Arc::new(user_tx),
        }
    }

    /// Only a fully-loaded city is ever committed here.
    pub fn set_city(&self, city: City) {
        self.city_tx.send_replace(Some(city));
    }

    pub fn set_user(&self, user: UserState) {
        self.user_tx.send_replace(user);
    }

    pub fn watch_city(&self) -> watch::Receiver<Option<City>> {
        self.city_tx.subscribe()
    }

    pub fn watch_user(&self) -> watch::Receiver<UserState> {
        self.user_tx.subscribe()
    }

    pub fn current_city_id(&self) -> Option<i64> {
        self.city_tx.borrow().as_ref().map(|city| city.id)
    }

    pub fn is_user_present(&self) -> bool {
        self.user_tx.borrow().is_present()
    }

    /// Display fields of the committed city, derived on read.
    pub fn city_projection(&self) -> Option<CityProjection> {
        self.city_tx.borrow().as_ref().map(|city| CityProjection {
            id: city.id,
            name: city.name.clone(),
            color: city.color,
        })
    }
}

impl Default for ContextBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

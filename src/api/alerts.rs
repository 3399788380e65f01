use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::model::Id;

/// Builds the `X-{app}-alert` / `X-{app}-params` headers attached to
/// successful writes so a client can show a notification.
#[derive(Debug, Clone)]
pub struct Alerts {
    app_name: String,
    alert: HeaderName,
    params: HeaderName,
}

impl Alerts {
    pub fn new(app_name: &str) -> Result<Self> {
        let alert = HeaderName::try_from(format!("x-{}-alert", app_name.to_lowercase()))
            .with_context(|| format!("Invalid application name for headers: {app_name}"))?;
        let params = HeaderName::try_from(format!("x-{}-params", app_name.to_lowercase()))
            .with_context(|| format!("Invalid application name for headers: {app_name}"))?;

        Ok(Self {
            app_name: app_name.to_string(),
            alert,
            params,
        })
    }

    pub fn created(&self, entity_name: &str, id: Id) -> HeaderMap {
        self.entity_alert(entity_name, "created", id)
    }

    pub fn updated(&self, entity_name: &str, id: Id) -> HeaderMap {
        self.entity_alert(entity_name, "updated", id)
    }

    pub fn deleted(&self, entity_name: &str, id: Id) -> HeaderMap {
        self.entity_alert(entity_name, "deleted", id)
    }

    fn entity_alert(&self, entity_name: &str, action: &str, id: Id) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let message = format!("{}.{}.{}", self.app_name, entity_name, action);
        if let Ok(value) = HeaderValue::from_str(&message) {
            headers.insert(self.alert.clone(), value);
        }
        headers.insert(self.params.clone(), HeaderValue::from(id));
        headers
    }
}

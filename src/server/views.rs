//! HTML views rendered with handlebars

use handlebars::Handlebars;
use serde_json::{json, Value};

use crate::error::{GatewayError, Result};
use crate::server::auth::AuthContext;

const HOME: &str = "home";

/// Claims tried in order for the greeting line.
const DISPLAY_NAME_CLAIMS: [&str; 4] = ["name", "email", "phone_number", "sub"];

/// Compiled templates.
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    /// Compiles the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Template`] if a template does not parse.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(HOME, include_str!("../../templates/home.hbs"))
            .map_err(|e| GatewayError::Template(format!("failed to compile home view: {e}")))?;
        Ok(Self { registry })
    }

    /// Renders the home page for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Template`] if rendering fails.
    pub fn render_home(&self, context: &AuthContext) -> Result<String> {
        let data = home_data(context);
        self.registry
            .render(HOME, &data)
            .map_err(|e| GatewayError::Template(format!("failed to render home view: {e}")).into())
    }
}

fn home_data(context: &AuthContext) -> Value {
    let Some(info) = context.user_info.as_ref().filter(|_| context.is_authenticated) else {
        return json!({ "is_authenticated": false });
    };

    let display_name = DISPLAY_NAME_CLAIMS
        .iter()
        .find_map(|claim| info.get(*claim).and_then(Value::as_str));

    let mut claims: Vec<Value> = info
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": claim_text(value) }))
        .collect();
    claims.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    json!({
        "is_authenticated": true,
        "display_name": display_name,
        "claims": claims,
    })
}

fn claim_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Builds the page that sends the cardholder's browser to the bank's 3-D Secure screen.

use crate::error::ConfigurationError;
use crate::models::responses::OosRequestDataResponse;
use crate::services::endpoints::{EndpointTable, Environment};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

const FORM_NAME: &str = "posnet3d";

/// Hidden fields the bank's 3-D Secure page expects.
#[derive(Debug, Clone)]
pub struct OosRedirectFields {
    pub merchant_id: String,
    pub posnet_id: String,
    pub packets: OosRequestDataResponse,
    pub return_url: String,
    pub lang: String,
}

impl OosRedirectFields {
    pub fn into_fields(self) -> Vec<(String, String)> {
        vec![
            ("mid".to_string(), self.merchant_id),
            ("posnetID".to_string(), self.posnet_id),
            ("posnetData".to_string(), self.packets.data1),
            ("posnetData2".to_string(), self.packets.data2),
            ("digest".to_string(), self.packets.sign),
            ("vftCode".to_string(), String::new()),
            ("merchantReturnURL".to_string(), self.return_url),
            ("lang".to_string(), self.lang),
            ("url".to_string(), String::new()),
            ("openANewWindow".to_string(), "0".to_string()),
        ]
    }
}

/// Escapes text for use inside a double- or single-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders the self-submitting form posting `fields` to `action`.
pub fn render_redirect_page(action: &str, fields: &[(String, String)]) -> String {
    let mut inputs = String::new();
    for (name, value) in fields {
        inputs.push_str(&format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
            escape_attribute(name),
            escape_attribute(value)
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>3-D Secure</title></head>\n\
         <body onload=\"document.getElementById('redirect-submit').style.display='none';\
         document.getElementById('redirect-wait').style.display='block';\
         document.forms['{form}'].submit();\">\n\
         <form id=\"{form}\" name=\"{form}\" method=\"post\" action=\"{action}\">\n\
         {inputs}\
         <input id=\"redirect-submit\" type=\"submit\" value=\"Continue\">\n\
         <p id=\"redirect-wait\" style=\"display:none\">Please wait...</p>\n\
         </form>\n\
         </body>\n\
         </html>\n",
        form = FORM_NAME,
        action = escape_attribute(action),
        inputs = inputs,
    )
}

/// Base64 of the redirect page for the 3-D Secure endpoint of `environment`.
///
/// Performs no I/O. A non-3-D environment is mapped to its 3-D counterpart.
pub fn build_redirect_form(
    endpoints: &EndpointTable,
    environment: &Environment,
    fields: &[(String, String)],
) -> Result<String, ConfigurationError> {
    let action = endpoints.url_for(&environment.three_d())?;
    Ok(BASE64.encode(render_redirect_page(action, fields)))
}

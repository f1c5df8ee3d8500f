//! USPS Web Tools `Verify` API.
//!
//! USPS swaps the usual meaning of the address lines: `Address1` is the
//! secondary unit and `Address2` the primary street.

use std::time::Duration;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use crate::address::AddressComponents;
use crate::utils::retry_wrapper;
use crate::verify::{Verify, VerifyError};

const USPS_API_URL: &str = "https://secure.shippingapis.com/ShippingAPI.dll";
const UA: &str = concat!("addrstd/", env!("CARGO_PKG_VERSION"));
const SERVICE: &str = "USPS";

/// HTTP client for the USPS address verification endpoint
pub struct UspsClient {
    client: Client,
    user_id: String,
    retries: usize,
}

impl UspsClient {
    pub fn new(user_id: impl Into<String>, timeout: Duration, retries: usize) -> color_eyre::Result<Self> {
        Ok(
            Self {
                client: Client::builder()
                    .default_headers(Self::default_headers())
                    .timeout(timeout)
                    .build()?,
                user_id: user_id.into(),
                retries,
            }
        )
    }

    fn default_headers() -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(USER_AGENT, HeaderValue::from_static(UA));
        map
    }

    #[tracing::instrument(name = "usps_verify", skip_all)]
    pub async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        let xml = build_request(&self.user_id, address)?;
        let body = retry_wrapper(self.retries, || self.fetch(&xml)).await?;
        parse_response(&body)
    }

    async fn fetch(&self, xml: &str) -> Result<String, VerifyError> {
        let resp = self.client
            .get(USPS_API_URL)
            .query(&[("API", "Verify"), ("XML", xml)])
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(VerifyError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

impl Verify for UspsClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        UspsClient::verify(self, address).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "AddressValidateRequest")]
struct VerifyRequest<'a> {
    #[serde(rename = "@USERID")]
    user_id: &'a str,
    #[serde(rename = "Revision")]
    revision: u8,
    #[serde(rename = "Address")]
    address: RequestAddress<'a>,
}

#[derive(Debug, Serialize)]
struct RequestAddress<'a> {
    #[serde(rename = "@ID")]
    id: u8,
    #[serde(rename = "Address1")]
    secondary: &'a str,
    #[serde(rename = "Address2")]
    street: &'a str,
    #[serde(rename = "City")]
    city: &'a str,
    #[serde(rename = "State")]
    state: &'a str,
    #[serde(rename = "Zip5")]
    zip5: &'a str,
    #[serde(rename = "Zip4")]
    zip4: &'a str,
}

/// Build the `AddressValidateRequest` document for one address.
fn build_request(user_id: &str, address: &AddressComponents) -> Result<String, VerifyError> {
    let digits = address.zip
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    let zip5 = digits.get(..5).unwrap_or_default();
    let zip4 = digits.get(5..9).unwrap_or_default();

    let request = VerifyRequest {
        user_id,
        revision: 1,
        address: RequestAddress {
            id: 0,
            secondary: &address.address2,
            street: &address.address1,
            city: &address.city,
            state: &address.state,
            zip5,
            zip4,
        },
    };
    quick_xml::se::to_string(&request).map_err(|e| VerifyError::Request(e.to_string()))
}

/// Either an `AddressValidateResponse` or a bare top-level `<Error>`.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(rename = "Address")]
    address: Option<ResponseAddress>,
    #[serde(rename = "Number")]
    number: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseAddress {
    #[serde(rename = "Address1")]
    address1: Option<String>,
    #[serde(rename = "Address2")]
    address2: Option<String>,
    #[serde(rename = "City")]
    city: Option<String>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "Zip5")]
    zip5: Option<String>,
    #[serde(rename = "Zip4")]
    zip4: Option<String>,
    #[serde(rename = "Error")]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(rename = "Number")]
    number: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
}

fn field(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn rejected(number: Option<String>, description: Option<String>) -> VerifyError {
    let description = [field(description), field(number)]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "USPS API error".to_string());
    VerifyError::Rejected {
        service: SERVICE,
        description,
    }
}

/// Map a `Verify` response body back to address components.
fn parse_response(body: &str) -> Result<AddressComponents, VerifyError> {
    let response: VerifyResponse = quick_xml::de::from_str(body).map_err(|e| {
        let raw = body.chars().take(500).collect::<String>();
        VerifyError::Malformed(format!("XML parse error: {}. Raw response: {}", e, raw))
    })?;
    debug!("USPS response: {:?}", response);

    if response.number.is_some() || response.description.is_some() {
        return Err(rejected(response.number, response.description));
    }
    let address = response.address
        .ok_or_else(|| VerifyError::Malformed("No Address element in USPS response".to_string()))?;
    if let Some(err) = address.error {
        return Err(rejected(err.number, err.description));
    }

    let zip5 = field(address.zip5);
    let zip4 = field(address.zip4);
    let zip = if !zip5.is_empty() && !zip4.is_empty() {
        format!("{}-{}", zip5, zip4)
    } else {
        zip5
    };

    Ok(
        AddressComponents {
            address1: field(address.address2),
            address2: field(address.address1),
            city: field(address.city),
            state: field(address.state),
            zip,
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> AddressComponents {
        AddressComponents {
            address1: "456 ELM ST".to_string(),
            address2: "APT 4B".to_string(),
            city: "SMALLVILLE".to_string(),
            state: "IL".to_string(),
            zip: "60606-1234".to_string(),
        }
    }

    #[test]
    fn request_swaps_street_and_secondary() {
        let xml = build_request("USER1", &local()).unwrap();
        assert!(xml.starts_with("<AddressValidateRequest"));
        assert!(xml.contains(r#"USERID="USER1""#));
        assert!(xml.contains("<Revision>1</Revision>"));
        assert!(xml.contains("<Address1>APT 4B</Address1>"));
        assert!(xml.contains("<Address2>456 ELM ST</Address2>"));
        assert!(xml.contains("<Zip5>60606</Zip5>"));
        assert!(xml.contains("<Zip4>1234</Zip4>"));
    }

    #[test]
    fn request_escapes_markup() {
        let address = AddressComponents {
            address1: "1 A&B <PLAZA>".to_string(),
            ..Default::default()
        };
        let xml = build_request("ID\"X", &address).unwrap();
        assert!(xml.contains("1 A&amp;B &lt;PLAZA"));
        assert!(!xml.contains("ID\"X"));
    }

    #[test]
    fn short_zip_sends_no_zip4() {
        let address = AddressComponents {
            zip: "606".to_string(),
            ..local()
        };
        let xml = build_request("USER1", &address).unwrap();
        assert!(!xml.contains("<Zip5>606</Zip5>"));
        assert!(!xml.contains("<Zip4>1234</Zip4>"));
    }

    #[test]
    fn parses_verified_address() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<AddressValidateResponse><Address ID="0"><Address1>APT 4B</Address1><Address2>456 ELM ST</Address2><City>SMALLVILLE</City><State>IL</State><Zip5>60606</Zip5><Zip4>1234</Zip4></Address></AddressValidateResponse>"#;
        assert_eq!(parse_response(body).unwrap(), local());
    }

    #[test]
    fn parses_address_without_secondary_or_zip4() {
        let body = r#"<AddressValidateResponse><Address ID="0"><Address2>100 MAIN ST</Address2><City>SPRINGFIELD</City><State>IL</State><Zip5>62704</Zip5></Address></AddressValidateResponse>"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.address1, "100 MAIN ST");
        assert_eq!(parsed.address2, "");
        assert_eq!(parsed.zip, "62704");
    }

    #[test]
    fn top_level_error_is_rejected() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Number>80040B1A</Number><Description>Authorization failure.</Description><Source>USPSCOM::DoAuth</Source></Error>"#;
        match parse_response(body) {
            Err(VerifyError::Rejected { description, .. }) => assert_eq!(description, "Authorization failure."),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn address_level_error_is_rejected() {
        let body = r#"<AddressValidateResponse><Address ID="0"><Error><Number>-2147219401</Number><Source>clsAMS</Source><Description>Address Not Found.  </Description><HelpFile></HelpFile><HelpContext></HelpContext></Error></Address></AddressValidateResponse>"#;
        match parse_response(body) {
            Err(VerifyError::Rejected { description, .. }) => assert_eq!(description, "Address Not Found."),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_address_is_malformed() {
        let body = "<AddressValidateResponse></AddressValidateResponse>";
        assert!(matches!(parse_response(body), Err(VerifyError::Malformed(_))));
    }
}

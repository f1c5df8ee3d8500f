use std::cell::RefCell;
use color_eyre::eyre::{eyre, WrapErr};
use smarty_rust_sdk::sdk::authentication::SecretKeyCredential;
use smarty_rust_sdk::sdk::batch::Batch;
use smarty_rust_sdk::sdk::options::{Options, OptionsBuilder};
use smarty_rust_sdk::us_street_api::client::USStreetAddressClient;
use smarty_rust_sdk::us_street_api::lookup::{Lookup, MatchStrategy};
use crate::address::AddressComponents;
use crate::verify::{Verify, VerifyError};

const SERVICE: &str = "Smarty";

/// A free trial account is limited to 1000 lookups per month.
const LOOKUPS_PER_ACCOUNT: u32 = 1000;

/// Rotates through several Smarty accounts so a batch is not capped by the
/// monthly quota of a single one.
pub struct SmartyClientProxy {
    clients: Vec<SmartyClient>,
    state: RefCell<Vec<ClientState>>,
}

impl SmartyClientProxy {
    pub fn new(credentials: &[(String, String)]) -> color_eyre::Result<Self> {
        if credentials.is_empty() {
            return Err(eyre!("at least one Smarty credential pair is required"));
        }
        let clients = credentials.iter()
            .map(|(id, secret)| SmartyClient::new(id.as_str(), secret.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let state = clients.iter().map(|_| ClientState::default()).collect();
        Ok(
            Self {
                clients,
                state: RefCell::new(state),
            }
        )
    }

    /// parse authentication credentials
    ///
    /// `ID1`=`SECRET1`[,`ID2`=`SECRET2`]*
    pub fn parse_credentials(raw: &str) -> color_eyre::Result<Vec<(String, String)>> {
        raw.split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| {
                let (id, secret) = pair.trim()
                    .split_once('=')
                    .ok_or_else(|| eyre!("credential pair is not `ID=SECRET`: [{}]", pair))?;
                Ok((id.to_string(), secret.to_string()))
            })
            .collect()
    }

    #[tracing::instrument(name = "smarty_verify", skip_all)]
    pub async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        let client = self.next_client()?;
        client.verify(address).await
    }

    fn next_client(&self) -> Result<&SmartyClient, VerifyError> {
        let idx = self.get_client_id()
            .ok_or(VerifyError::QuotaExhausted(self.clients.len()))?;
        self.update_state(idx);
        Ok(&self.clients[idx])
    }

    /// get the index of a client that is not exceeded
    fn get_client_id(&self) -> Option<usize> {
        self.state.borrow().iter().position(|state| !state.is_exceeded())
    }

    fn update_state(&self, idx: usize) {
        let mut state = self.state.borrow_mut();
        state[idx].lookups += 1;
    }
}

impl Verify for SmartyClientProxy {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        SmartyClientProxy::verify(self, address).await
    }
}

#[derive(Default)]
struct ClientState {
    lookups: u32,
}

impl ClientState {
    fn is_exceeded(&self) -> bool {
        self.lookups >= LOOKUPS_PER_ACCOUNT
    }
}

struct SmartyClient {
    client: USStreetAddressClient,
}

impl SmartyClient {
    fn new(auth_id: impl Into<String>, auth_token: impl Into<String>) -> color_eyre::Result<Self> {
        Ok(
            Self {
                client: USStreetAddressClient::new(Self::options(auth_id, auth_token))
                    .wrap_err("cannot create Smarty client")?,
            }
        )
    }

    async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        let mut batch = Batch::default();
        batch.push(Lookup::from(address))
            .map_err(|e| VerifyError::Request(e.to_string()))?;
        self.client.send(&mut batch).await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;
        let resp = batch.records().into_iter().next()
            .ok_or_else(|| VerifyError::Malformed("no response from Smarty".to_string()))?;
        resp.clone().try_into()
    }

    fn authentication(auth_id: impl Into<String>, auth_token: impl Into<String>) -> Box<SecretKeyCredential> {
        SecretKeyCredential::new(
            auth_id.into(),
            auth_token.into(),
        )
    }

    fn options(auth_id: impl Into<String>, auth_token: impl Into<String>) -> Options {
        OptionsBuilder::new(Some(Self::authentication(auth_id, auth_token)))
            .with_license("us-core-cloud")
            .with_retries(3)
            .build()
    }
}

impl From<&AddressComponents> for Lookup {
    fn from(address: &AddressComponents) -> Self {
        Self {
            street: address.address1.clone(),
            secondary: address.address2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zipcode: address.zip.clone(),
            match_strategy: MatchStrategy::Enhanced,
            ..Default::default()
        }
    }
}

/// Join the secondary designator and number Smarty reports, i.e. `APT 4B`.
fn secondary_line(designator: &str, number: &str) -> String {
    [designator.trim(), number.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// `delivery_line_1` carries the secondary unit at its end; drop it
fn primary_line(delivery_line: &str, secondary: &str) -> String {
    let line = delivery_line.trim().to_uppercase();
    if secondary.is_empty() {
        return line;
    }
    match line.strip_suffix(secondary) {
        Some(primary) => primary.trim().to_string(),
        None => line,
    }
}

impl TryFrom<Lookup> for AddressComponents {
    type Error = VerifyError;

    fn try_from(lookup: Lookup) -> Result<Self, Self::Error> {
        let candidate = lookup.results
            .into_iter()
            .next()
            .ok_or_else(|| VerifyError::Rejected {
                service: SERVICE,
                description: "no candidates".to_string(),
            })?;
        let components = candidate.components;

        let address2 = secondary_line(&components.secondary_designator, &components.secondary_number);
        let address1 = primary_line(&candidate.delivery_line_1, &address2);
        let zip = if components.plus4_code.is_empty() {
            components.zipcode
        } else {
            format!("{}-{}", components.zipcode, components.plus4_code)
        };

        Ok(
            Self {
                address1,
                address2,
                city: components.city_name.to_uppercase(),
                state: components.state_abbreviation.to_uppercase(),
                zip,
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_credential_pairs() {
        let credentials = SmartyClientProxy::parse_credentials("id1=secret1, id2=secret2").unwrap();
        assert_eq!(
            credentials,
            vec![
                ("id1".to_string(), "secret1".to_string()),
                ("id2".to_string(), "secret2".to_string()),
            ]
        );
        assert!(SmartyClientProxy::parse_credentials("id-without-secret").is_err());
    }

    #[test]
    fn secondary_is_stripped_from_delivery_line() {
        let secondary = secondary_line("Apt", "4B");
        assert_eq!(secondary, "APT 4B");
        assert_eq!(primary_line("456 Elm St Apt 4B", &secondary), "456 ELM ST");
        assert_eq!(primary_line("PO Box 789", ""), "PO BOX 789");
    }

    #[test]
    fn quota_is_per_account() {
        let mut state = ClientState::default();
        assert!(!state.is_exceeded());
        state.lookups = LOOKUPS_PER_ACCOUNT;
        assert!(state.is_exceeded());
    }

    #[test]
    fn empty_lookup_has_no_candidates() {
        let lookup = Lookup::from(&AddressComponents::default());
        assert!(matches!(
            AddressComponents::try_from(lookup),
            Err(VerifyError::Rejected { .. })
        ));
    }
}

use crate::config::ProjectConfig;
use crate::traits::HttpClient;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

const SERVICE_PATH: &str = "/twirp/livekit.AgentDispatchService";

/// A dispatch record binding an agent to a room
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDispatch {
    pub id: String,
    pub room: String,
    pub agent_name: String,
    pub metadata: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListDispatchRequest<'a> {
    room: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch_id: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListDispatchResponse {
    agent_dispatches: Vec<AgentDispatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDispatchRequest<'a> {
    pub room: &'a str,
    pub agent_name: &'a str,
    pub metadata: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteDispatchRequest<'a> {
    room: &'a str,
    dispatch_id: &'a str,
}

/// Client for the remote agent-dispatch service. Pure request/response;
/// errors propagate untouched.
pub struct DispatchClient<'a> {
    http: &'a dyn HttpClient,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl<'a> DispatchClient<'a> {
    pub fn new(http: &'a dyn HttpClient, project: &ProjectConfig) -> Result<Self> {
        Ok(Self {
            http,
            base_url: project.http_url()?,
            api_key: project.api_key.clone(),
            api_secret: project.api_secret.clone(),
        })
    }

    fn rpc(&self, method: &str, body: String) -> Result<String> {
        let url = format!("{}{}/{}", self.base_url, SERVICE_PATH, method);
        self.http
            .post_json(&url, &self.api_key, &self.api_secret, &body)
    }

    /// List dispatches in a room, optionally narrowed to one ID
    pub fn list(&self, room: &str, dispatch_id: Option<&str>) -> Result<Vec<AgentDispatch>> {
        let body = serde_json::to_string(&ListDispatchRequest { room, dispatch_id })?;
        let response = self.rpc("ListDispatch", body)?;
        let parsed: ListDispatchResponse = serde_json::from_str(&response)
            .context("Failed to parse dispatch list response")?;
        Ok(parsed.agent_dispatches)
    }

    pub fn create(&self, request: &CreateDispatchRequest) -> Result<AgentDispatch> {
        let body = serde_json::to_string(request)?;
        let response = self.rpc("CreateDispatch", body)?;
        serde_json::from_str(&response).context("Failed to parse created dispatch")
    }

    pub fn delete(&self, room: &str, dispatch_id: &str) -> Result<AgentDispatch> {
        let body = serde_json::to_string(&DeleteDispatchRequest { room, dispatch_id })?;
        let response = self.rpc("DeleteDispatch", body)?;
        serde_json::from_str(&response).context("Failed to parse deleted dispatch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_project;
    use crate::traits::MockHttpClient;

    #[test]
    fn test_list_hits_twirp_endpoint_over_https() {
        let http = MockHttpClient::new().with_response(
            "ListDispatch",
            r#"{"agentDispatches": [{"id": "d-1", "room": "alpha", "agentName": "greeter", "metadata": ""}]}"#,
        );

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        let dispatches = client.list("alpha", None).unwrap();

        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].agent_name, "greeter");

        let requests = http.get_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with(
            "https://demo.example.io/twirp/livekit.AgentDispatchService/ListDispatch"
        ));
        assert!(requests[0].contains(r#""room":"alpha""#));
        assert!(!requests[0].contains("dispatchId"));
    }

    #[test]
    fn test_get_narrows_by_dispatch_id() {
        let http = MockHttpClient::new()
            .with_response("ListDispatch", r#"{"agentDispatches": []}"#);

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        client.list("alpha", Some("d-42")).unwrap();

        assert!(http.get_requests()[0].contains(r#""dispatchId":"d-42""#));
    }

    #[test]
    fn test_create_round_trip() {
        let http = MockHttpClient::new().with_response(
            "CreateDispatch",
            r#"{"id": "d-9", "room": "beta", "agentName": "notetaker", "metadata": "{}"}"#,
        );

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        let created = client
            .create(&CreateDispatchRequest {
                room: "beta",
                agent_name: "notetaker",
                metadata: "{}",
            })
            .unwrap();

        assert_eq!(created.id, "d-9");
        assert!(http.get_requests()[0].contains(r#""agentName":"notetaker""#));
    }

    #[test]
    fn test_delete_sends_room_and_id() {
        let http = MockHttpClient::new().with_response(
            "DeleteDispatch",
            r#"{"id": "d-9", "room": "beta", "agentName": "notetaker", "metadata": ""}"#,
        );

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        let deleted = client.delete("beta", "d-9").unwrap();

        assert_eq!(deleted.room, "beta");
        assert!(http.get_requests()[0].contains(r#""dispatchId":"d-9""#));
    }

    #[test]
    fn test_service_error_propagates() {
        let http = MockHttpClient::new().with_error("ListDispatch", "HTTP request failed with status 401");

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        let result = client.list("alpha", None);

        assert!(format!("{}", result.unwrap_err()).contains("401"));
    }

    #[test]
    fn test_malformed_response_is_an_error() {
        let http = MockHttpClient::new().with_response("ListDispatch", "not json");

        let client = DispatchClient::new(&http, &test_project()).unwrap();
        assert!(client.list("alpha", None).is_err());
    }
}

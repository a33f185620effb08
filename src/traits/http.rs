use anyhow::{Context, Result, bail};

/// HTTP client trait for testing
pub trait HttpClient: Send + Sync {
    /// GET a URL and return the response body
    fn get(&self, url: &str) -> Result<String>;

    /// GET a URL with basic credentials and return the response body
    fn get_authed(&self, url: &str, api_key: &str, api_secret: &str) -> Result<String>;

    /// POST a JSON body with basic credentials and return the response body
    fn post_json(&self, url: &str, api_key: &str, api_secret: &str, body: &str) -> Result<String>;
}

/// Real HTTP client using reqwest
pub struct ReqwestClient;

impl ReqwestClient {
    fn read_response(url: &str, response: reqwest::blocking::Response) -> Result<String> {
        if !response.status().is_success() {
            bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        response
            .text()
            .with_context(|| format!("Failed to read response body from: {}", url))
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<String> {
        let response = reqwest::blocking::get(url)
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        Self::read_response(url, response)
    }

    fn get_authed(&self, url: &str, api_key: &str, api_secret: &str) -> Result<String> {
        let response = reqwest::blocking::Client::new()
            .get(url)
            .basic_auth(api_key, Some(api_secret))
            .send()
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        Self::read_response(url, response)
    }

    fn post_json(&self, url: &str, api_key: &str, api_secret: &str, body: &str) -> Result<String> {
        let response = reqwest::blocking::Client::new()
            .post(url)
            .basic_auth(api_key, Some(api_secret))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .with_context(|| format!("Failed to post to URL: {}", url))?;

        Self::read_response(url, response)
    }
}

/// Mock HTTP client for testing: maps URL substrings to canned responses
#[cfg(test)]
pub struct MockHttpClient {
    responses: std::sync::Mutex<Vec<(String, Result<String, String>)>>,
    requests: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[allow(dead_code)]
impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Vec::new()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Respond with `body` to any request whose URL contains `url_part`
    pub fn with_response(self, url_part: &str, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((url_part.to_string(), Ok(body.to_string())));
        self
    }

    /// Fail any request whose URL contains `url_part`
    pub fn with_error(self, url_part: &str, error: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((url_part.to_string(), Err(error.to_string())));
        self
    }

    /// URLs requested through this client, in order
    pub fn get_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        let responses = self.responses.lock().unwrap();
        for (url_part, response) in responses.iter() {
            if url.contains(url_part.as_str()) {
                return match response {
                    Ok(body) => Ok(body.clone()),
                    Err(error) => Err(anyhow::anyhow!("{}", error)),
                };
            }
        }
        Err(anyhow::anyhow!("No mock response configured for: {}", url))
    }
}

#[cfg(test)]
impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl HttpClient for MockHttpClient {
    fn get(&self, url: &str) -> Result<String> {
        self.respond(url)
    }

    fn get_authed(&self, url: &str, _api_key: &str, _api_secret: &str) -> Result<String> {
        self.respond(url)
    }

    fn post_json(&self, url: &str, _api_key: &str, _api_secret: &str, body: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", url, body));

        let responses = self.responses.lock().unwrap();
        for (url_part, response) in responses.iter() {
            if url.contains(url_part.as_str()) {
                return match response {
                    Ok(resp_body) => Ok(resp_body.clone()),
                    Err(error) => Err(anyhow::anyhow!("{}", error)),
                };
            }
        }
        Err(anyhow::anyhow!("No mock response configured for: {}", url))
    }
}

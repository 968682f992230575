use crate::client::config::Config;
use crate::client::consts::SERVICE_PATH;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    format!(
        "{}{}?key={}",
        config.base_url(),
        SERVICE_PATH,
        config.api_key().expose_secret()
    )
    .into_client_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_build_request_targets_bidi_endpoint_with_key() {
        let config = Config::builder()
            .with_base_url("wss://example.test/")
            .with_api_key(SecretString::from("abc123".to_string()))
            .build();

        let request = build_request(&config).unwrap();

        assert_eq!(request.uri().host(), Some("example.test"));
        assert_eq!(request.uri().path(), SERVICE_PATH);
        assert_eq!(request.uri().query(), Some("key=abc123"));
    }
}

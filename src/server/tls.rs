use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use super::ServerError;
use crate::cli::Args;

/// Certificate and key paths, present only when TLS is enabled and fully configured.
pub fn tls_paths(args: &Args) -> Result<Option<(String, String)>, ServerError> {
    if !args.enable_tls {
        return Ok(None);
    }
    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert), Some(key)) => Ok(Some((cert.clone(), key.clone()))),
        _ =>
            Err(
                ServerError::Tls(
                    "Both --tls-cert-path and --tls-key-path must be provided to enable TLS".into()
                )
            ),
    }
}

pub fn load_tls_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, ServerError> {
    let open = |path: &str| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| ServerError::Tls(format!("Failed to open '{}': {}", path, e)))
    };
    let mut cert_reader = open(cert_path)?;
    let mut key_reader = open(key_path)?;

    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| ServerError::Tls(format!("Failed to read certificate(s): {}", e)))?;

    let key = match pkcs8_private_keys(&mut key_reader).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(ServerError::Tls(format!("Error reading private key: {}", e)));
        }
        None => {
            return Err(ServerError::Tls("No PKCS8 private key found in key file".into()));
        }
    };

    // Both ring and aws-lc-rs are compiled in, so the provider must be chosen explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| ServerError::Tls(e.to_string()))?;

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(enable_tls: bool, cert: Option<&str>, key: Option<&str>) -> Args {
        Args {
            server_addr: "127.0.0.1:4000".into(),
            http_addr: "127.0.0.1:8501".into(),
            secrets_path: "secrets.toml".into(),
            openai_base_url: None,
            max_output_tokens: 300,
            debug: false,
            tls_cert_path: cert.map(str::to_string),
            tls_key_path: key.map(str::to_string),
            enable_tls,
        }
    }

    #[test]
    fn disabled_tls_ignores_paths() {
        assert_eq!(tls_paths(&args(false, Some("cert.pem"), Some("key.pem"))).unwrap(), None);
    }

    #[test]
    fn enabled_tls_requires_both_paths() {
        assert!(matches!(tls_paths(&args(true, Some("cert.pem"), None)), Err(ServerError::Tls(_))));
        assert_eq!(
            tls_paths(&args(true, Some("cert.pem"), Some("key.pem"))).unwrap(),
            Some(("cert.pem".to_string(), "key.pem".to_string()))
        );
    }

    #[test]
    fn missing_certificate_file_is_reported() {
        let err = load_tls_config("/nonexistent/cert.pem", "/nonexistent/key.pem").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }
}
